//! Repository interfaces
//!
//! The engine consumes storage only through these traits. Backing schema and
//! migrations are out of scope; the in-memory adapter in `adapters::memory`
//! provides the same atomicity guarantees a relational backend must give:
//! unique open position per (deployment, token, signal), compare-and-set
//! close, and monotonic high-water-mark updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::deployment::Deployment;
use crate::domain::position::{CloseReason, Fill, Position};
use crate::domain::routing::VenueRoutingDecision;
use crate::domain::signal::Side;
use crate::domain::venue::{Venue, VenueMarket};
use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent writer won; the caller's precondition no longer holds.
    #[error("Conflicting concurrent write")]
    Conflict,
    #[error("Record not found")]
    NotFound,
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => EngineError::StoreConflict,
            other => EngineError::Store(other.to_string()),
        }
    }
}

/// Result of a conditional close.
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    /// This call performed the close.
    Closed(Position),
    /// Another writer closed it first; the original exit data is returned
    /// untouched. Not an error.
    AlreadyClosed(Position),
}

impl CloseOutcome {
    pub fn position(&self) -> &Position {
        match self {
            CloseOutcome::Closed(p) | CloseOutcome::AlreadyClosed(p) => p,
        }
    }
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Insert an open position. Fails with `Conflict` when an open position
    /// already exists for the same (deployment, token, signal).
    async fn insert_open(&self, position: Position) -> Result<Position, StoreError>;

    async fn position(&self, id: Uuid) -> Result<Option<Position>, StoreError>;

    async fn find_open(&self) -> Result<Vec<Position>, StoreError>;

    /// Open position for a (deployment, token) pair, if any.
    async fn find_open_for_token(
        &self,
        deployment_id: Uuid,
        token_symbol: &str,
    ) -> Result<Option<Position>, StoreError>;

    /// Any position (open or closed) created from this signal for this
    /// deployment. Used for idempotent execution.
    async fn find_by_signal(
        &self,
        deployment_id: Uuid,
        signal_id: Uuid,
    ) -> Result<Option<Position>, StoreError>;

    /// Close the position only if it is still open. Concurrent closers get
    /// `AlreadyClosed` with the first writer's exit data.
    async fn close_if_open(
        &self,
        id: Uuid,
        fill: &Fill,
        reason: CloseReason,
    ) -> Result<CloseOutcome, StoreError>;

    /// Raise the trailing high-water-mark, never lowering it (compare-and-set
    /// against the stored value). Returns the effective mark after the call.
    async fn raise_high_water_mark(
        &self,
        id: Uuid,
        side: Side,
        candidate: f64,
    ) -> Result<f64, StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn market(&self, venue: Venue, token_symbol: &str)
        -> Result<Option<VenueMarket>, StoreError>;

    async fn upsert_market(&self, market: VenueMarket) -> Result<(), StoreError>;

    async fn list_markets(&self) -> Result<Vec<VenueMarket>, StoreError>;

    /// Per-wallet token whitelist for venues that require it.
    async fn is_wallet_whitelisted(
        &self,
        wallet: &str,
        token_symbol: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RoutingDecisionStore: Send + Sync {
    /// Append-only; decisions are never mutated.
    async fn append(&self, decision: VenueRoutingDecision) -> Result<(), StoreError>;

    async fn decisions_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<VenueRoutingDecision>, StoreError>;
}

#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn deployment(&self, id: Uuid) -> Result<Option<Deployment>, StoreError>;

    async fn upsert_deployment(&self, deployment: Deployment) -> Result<(), StoreError>;
}
