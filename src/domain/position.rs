//! Positions
//!
//! The mutable unit the engine owns. A position is created only from a
//! confirmed fill, transitions OPEN -> CLOSED exactly once, and is never
//! deleted by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::signal::{RiskModel, Side};
use crate::domain::venue::Venue;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Position is already closed")]
    AlreadyClosed,
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    /// Closed manually or by an external actor; detected at the venue.
    External,
    Manual,
}

/// A confirmed execution: the quantity and price that actually filled,
/// which may differ from what was requested due to slippage and fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub qty: f64,
    pub price: f64,
    /// Transaction hash or venue order reference.
    pub tx_ref: String,
    /// Fees paid for this execution, in USD.
    pub fees_usd: f64,
}

impl Fill {
    pub fn new(qty: f64, price: f64, tx_ref: impl Into<String>) -> Self {
        Self {
            qty,
            price,
            tx_ref: tx_ref.into(),
            fees_usd: 0.0,
        }
    }

    pub fn with_fees(mut self, fees_usd: f64) -> Self {
        self.fees_usd = fees_usd;
        self
    }
}

/// Risk parameters snapshotted into concrete trigger prices at entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub stop_loss_price: f64,
    pub take_profit_price: Option<f64>,
    pub trailing_pct: Option<f64>,
    pub trailing_activation_pct: Option<f64>,
    /// Best (most favorable) price seen since entry. Starts at entry price
    /// and only ever moves in the favorable direction.
    pub high_water_mark: f64,
}

impl RiskSnapshot {
    /// Derive concrete trigger prices from the signal's risk model and the
    /// actual entry price.
    pub fn from_risk_model(risk: &RiskModel, side: Side, entry_price: f64) -> Self {
        let sign = side.direction_sign();
        // Divide by 100 last: 100.0 * (1.0 + 10.0/100.0) is not exactly 110,
        // and a price observed exactly at the trigger must compare equal.
        let stop_loss_price = entry_price * (100.0 - sign * risk.stop_loss_pct) / 100.0;
        let take_profit_price = risk
            .take_profit_pct
            .map(|tp| entry_price * (100.0 + sign * tp) / 100.0);
        Self {
            stop_loss_price,
            take_profit_price,
            trailing_pct: risk.trailing_pct,
            trailing_activation_pct: risk.trailing_activation_pct,
            high_water_mark: entry_price,
        }
    }
}

/// An on-venue position owned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub deployment_id: Uuid,
    pub venue: Venue,
    pub token_symbol: String,
    pub side: Side,
    pub qty: f64,
    pub entry_price: f64,
    pub entry_tx_ref: String,
    /// Fees paid at entry (venue fees plus platform fee), in USD.
    pub entry_fees_usd: f64,
    pub risk: RiskSnapshot,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_tx_ref: Option<String>,
    pub realized_pnl: Option<f64>,
    pub close_reason: Option<CloseReason>,
}

impl Position {
    /// Create an open position from a confirmed entry fill.
    pub fn open(
        signal_id: Uuid,
        deployment_id: Uuid,
        venue: Venue,
        token_symbol: impl Into<String>,
        side: Side,
        fill: &Fill,
        risk: RiskSnapshot,
    ) -> Result<Self, PositionError> {
        if fill.qty <= 0.0 {
            return Err(PositionError::InvalidQuantity(fill.qty));
        }
        if fill.price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(fill.price));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            signal_id,
            deployment_id,
            venue,
            token_symbol: token_symbol.into(),
            side,
            qty: fill.qty,
            entry_price: fill.price,
            entry_tx_ref: fill.tx_ref.clone(),
            entry_fees_usd: fill.fees_usd,
            risk,
            opened_at: Utc::now(),
            closed_at: None,
            exit_price: None,
            exit_tx_ref: None,
            realized_pnl: None,
            close_reason: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Realized PnL for an exit at `fill`, entry and exit fees deducted.
    pub fn pnl_for_exit(&self, fill: &Fill) -> f64 {
        (fill.price - self.entry_price) * self.qty * self.side.direction_sign()
            - self.entry_fees_usd
            - fill.fees_usd
    }

    /// Unrealized PnL at the given reference price.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.qty * self.side.direction_sign()
    }

    /// Mark the position closed. Enforces the no-partial-close invariant:
    /// closed_at, exit price and exit tx ref are all set together.
    pub fn apply_close(&mut self, fill: &Fill, reason: CloseReason) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::AlreadyClosed);
        }
        self.realized_pnl = Some(self.pnl_for_exit(fill));
        self.exit_price = Some(fill.price);
        self.exit_tx_ref = Some(fill.tx_ref.clone());
        self.close_reason = Some(reason);
        self.closed_at = Some(Utc::now());
        Ok(())
    }
}
