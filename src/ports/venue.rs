//! Venue adapter seam
//!
//! The executor depends only on this normalized {submit order, confirm fill,
//! check open state} interface. Venue-specific adapters translate to and from
//! their own wire formats.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::position::{CloseReason, Fill};
use crate::domain::signal::Side;
use crate::domain::venue::Venue;
use crate::error::{EngineError, FailureClass};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    /// Venue or module rejected the order deterministically.
    #[error("Order rejected: {0}")]
    Rejected(String),
    /// On-chain revert with a decoded reason.
    #[error("Transaction reverted: {0}")]
    Reverted(String),
    /// Paying wallet cannot cover gas or collateral.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    /// No matching open position at the venue.
    #[error("Position not found at venue")]
    PositionNotFound,
}

impl AdapterError {
    /// Retryable vs fatal, per the engine's failure policy: transport noise
    /// and timeouts retry; reverts, rejections and funding problems do not.
    pub fn class(&self) -> FailureClass {
        match self {
            AdapterError::Timeout | AdapterError::Transport(_) => FailureClass::Retryable,
            AdapterError::Rejected(_)
            | AdapterError::Reverted(_)
            | AdapterError::InsufficientFunds(_)
            | AdapterError::PositionNotFound => FailureClass::Fatal,
        }
    }
}

impl From<AdapterError> for EngineError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout => EngineError::timeout("venue adapter call"),
            other => EngineError::ExecutionFailed {
                class: other.class(),
                detail: other.to_string(),
            },
        }
    }
}

/// Normalized open request handed to an adapter after routing, validation
/// and sizing are done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub wallet: String,
    /// Delegated agent credential for API venues.
    pub agent: Option<String>,
    pub token_symbol: String,
    /// On-chain token address for module-executed venues.
    pub token_address: Option<String>,
    pub side: Side,
    pub collateral_usd: f64,
    pub leverage: f64,
    /// Slippage tolerance in basis points for the min-output bound.
    pub slippage_bps: u16,
}

impl OpenOrder {
    /// Minimum acceptable output for `expected_out` under the order's
    /// slippage tolerance.
    pub fn min_amount_out(&self, expected_out: f64) -> f64 {
        expected_out * (1.0 - self.slippage_bps as f64 / 10_000.0)
    }
}

/// Normalized close request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseOrder {
    pub wallet: String,
    pub agent: Option<String>,
    pub token_symbol: String,
    pub token_address: Option<String>,
    pub side: Side,
    pub qty: f64,
    pub reason: CloseReason,
}

/// Execution destination capability. One adapter per venue, selected once by
/// the router's output and passed explicitly to the executor.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// Service reachability probe. Used by routing stats and operator tools.
    async fn health(&self) -> bool;

    /// Funding-asset balance for the wallet, in USD.
    async fn balance_usd(&self, wallet: &str) -> Result<f64, AdapterError>;

    /// Submit and confirm an opening trade, returning the actual fill
    /// (post-slippage quantity and price), never the requested size.
    async fn submit_open(&self, order: &OpenOrder) -> Result<Fill, AdapterError>;

    /// Submit and confirm a closing trade.
    async fn submit_close(&self, order: &CloseOrder) -> Result<Fill, AdapterError>;

    /// Whether the venue still reports an open position for (wallet, token).
    /// `Ok(false)` confirms external closure; it is not an error.
    async fn position_open(&self, wallet: &str, token_symbol: &str)
        -> Result<bool, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classes() {
        assert_eq!(AdapterError::Timeout.class(), FailureClass::Retryable);
        assert_eq!(
            AdapterError::Transport("reset".into()).class(),
            FailureClass::Retryable
        );
        assert_eq!(
            AdapterError::Reverted("TokenNotWhitelisted".into()).class(),
            FailureClass::Fatal
        );
        assert_eq!(
            AdapterError::InsufficientFunds("gas".into()).class(),
            FailureClass::Fatal
        );
    }

    #[test]
    fn test_timeout_maps_to_engine_timeout() {
        let err: EngineError = AdapterError::Timeout.into();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }

    #[test]
    fn test_min_amount_out() {
        let order = OpenOrder {
            wallet: "0xwallet".into(),
            agent: None,
            token_symbol: "WETH".into(),
            token_address: None,
            side: Side::Long,
            collateral_usd: 100.0,
            leverage: 1.0,
            slippage_bps: 50,
        };
        assert!((order.min_amount_out(1000.0) - 995.0).abs() < 1e-9);
    }
}
