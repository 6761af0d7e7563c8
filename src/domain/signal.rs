//! Trading signals
//!
//! A `Signal` is an immutable trading intent produced by an upstream
//! generator. The engine never mutates a signal; it only reads it to route,
//! validate and execute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::venue::{RequestedVenue, Venue};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short. Used in PnL and trigger math.
    pub fn direction_sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Returns true when `candidate` is a more favorable price than
    /// `incumbent` for this side.
    pub fn is_favorable(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Side::Long => candidate > incumbent,
            Side::Short => candidate < incumbent,
        }
    }
}

/// How the trade size is derived from the funding balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum SizeModel {
    /// Percentage of the wallet's funding-asset balance (0-100).
    BalancePercent(f64),
    /// Fixed USD amount, used for manual trades.
    FixedUsd(f64),
}

impl SizeModel {
    /// Compute the collateral to commit given the current funding balance.
    pub fn compute_size(&self, balance_usd: f64) -> f64 {
        match self {
            SizeModel::BalancePercent(pct) => balance_usd * pct / 100.0,
            SizeModel::FixedUsd(amount) => *amount,
        }
    }
}

/// Risk parameters attached to a signal. Percentages are relative to entry
/// price (10.0 = 10%). Exact values are configuration owned by the signal
/// generator, never hard-coded here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub stop_loss_pct: f64,
    pub take_profit_pct: Option<f64>,
    pub trailing_pct: Option<f64>,
    /// Favorable excursion from entry required before the trailing stop arms.
    pub trailing_activation_pct: Option<f64>,
    #[serde(default = "default_leverage")]
    pub leverage: f64,
}

fn default_leverage() -> f64 {
    1.0
}

impl RiskModel {
    /// Stop-loss only, no take-profit or trailing.
    pub fn stop_loss_only(stop_loss_pct: f64) -> Self {
        Self {
            stop_loss_pct,
            take_profit_pct: None,
            trailing_pct: None,
            trailing_activation_pct: None,
            leverage: 1.0,
        }
    }

    pub fn with_trailing(mut self, trailing_pct: f64, activation_pct: f64) -> Self {
        self.trailing_pct = Some(trailing_pct);
        self.trailing_activation_pct = Some(activation_pct);
        self
    }

    pub fn with_take_profit(mut self, take_profit_pct: f64) -> Self {
        self.take_profit_pct = Some(take_profit_pct);
        self
    }
}

/// Immutable trading intent. Created by the signal-generation collaborator;
/// read-only inside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    /// Agent that produced the signal.
    pub agent_id: Uuid,
    pub token_symbol: String,
    pub side: Side,
    pub requested_venue: RequestedVenue,
    pub size_model: SizeModel,
    pub risk_model: RiskModel,
    /// Generator confidence, 0-100.
    pub confidence: f64,
    /// Provenance references (tweet ids, research notes).
    pub source_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        agent_id: Uuid,
        token_symbol: impl Into<String>,
        side: Side,
        requested_venue: RequestedVenue,
        size_model: SizeModel,
        risk_model: RiskModel,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            token_symbol: token_symbol.into(),
            side,
            requested_venue,
            size_model,
            risk_model,
            confidence: 0.0,
            source_refs: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_source_refs(mut self, refs: Vec<String>) -> Self {
        self.source_refs = refs;
        self
    }

    /// True if the signal asked for a specific venue rather than routing.
    pub fn is_static_venue(&self) -> bool {
        matches!(self.requested_venue, RequestedVenue::Concrete(_))
    }

    pub fn concrete_venue(&self) -> Option<Venue> {
        match self.requested_venue {
            RequestedVenue::Concrete(v) => Some(v),
            RequestedVenue::Any => None,
        }
    }
}
