//! Engine-wide error taxonomy
//!
//! Every terminal failure carries a typed reason so downstream consumers
//! (notifications, dashboards) can branch without string-matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::venue::Venue;

/// Whether a failed operation is worth retrying with the same parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureClass {
    /// Transient: network, timeout, rate limit. Retry with backoff.
    Retryable,
    /// Deterministic for these parameters: revert, insufficient funds,
    /// rejected order. Surface for operator review instead of retrying.
    Fatal,
}

/// Typed rejection from pre-trade validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "reason")]
pub enum RejectReason {
    TokenNotWhitelisted {
        venue: Venue,
        token: String,
    },
    ModuleDisabled {
        venue: Venue,
    },
    PositionAlreadyOpen {
        token: String,
    },
    InsufficientBalance {
        required_usd: f64,
        available_usd: f64,
    },
    SizeTooSmall {
        size_usd: f64,
        min_usd: f64,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Venue {venue} does not list {token}")]
    VenueUnavailable { venue: Venue, token: String },

    #[error("No venue available for {token} (checked: {checked:?})")]
    NoVenueAvailable { token: String, checked: Vec<Venue> },

    #[error("Validation rejected: {0:?}")]
    ValidationRejected(RejectReason),

    #[error("Execution failed ({class:?}): {detail}")]
    ExecutionFailed {
        class: FailureClass,
        detail: String,
    },

    #[error("Concurrent write detected in store")]
    StoreConflict,

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Adapter error: {0}")]
    Adapter(String),
}

impl EngineError {
    pub fn retryable(detail: impl Into<String>) -> Self {
        EngineError::ExecutionFailed {
            class: FailureClass::Retryable,
            detail: detail.into(),
        }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        EngineError::ExecutionFailed {
            class: FailureClass::Fatal,
            detail: detail.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        EngineError::Timeout {
            operation: operation.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
