//! Position tracking
//!
//! Thin lifecycle layer over the position store. Opens are recorded only
//! from confirmed fills, with the signal's risk model snapshotted into
//! concrete trigger prices at the actual entry price. Closes go through the
//! store's conditional close, so a position transitions OPEN -> CLOSED at
//! most once regardless of how many actors race to close it.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::position::{CloseReason, Fill, Position, RiskSnapshot};
use crate::domain::signal::Signal;
use crate::domain::venue::Venue;
use crate::error::{EngineError, EngineResult};
use crate::ports::store::{CloseOutcome, PositionStore};

pub struct PositionTracker {
    store: Arc<dyn PositionStore>,
}

impl PositionTracker {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self { store }
    }

    /// Record a confirmed entry fill as a new open position.
    pub async fn record_open(
        &self,
        signal: &Signal,
        deployment_id: Uuid,
        venue: Venue,
        fill: &Fill,
    ) -> EngineResult<Position> {
        let risk = RiskSnapshot::from_risk_model(&signal.risk_model, signal.side, fill.price);
        let position = Position::open(
            signal.id,
            deployment_id,
            venue,
            &signal.token_symbol,
            signal.side,
            fill,
            risk,
        )
        .map_err(|e| EngineError::fatal(e.to_string()))?;

        let position = self.store.insert_open(position).await?;
        info!(
            position_id = %position.id,
            token = %position.token_symbol,
            venue = %venue,
            qty = position.qty,
            entry_price = position.entry_price,
            "Position opened"
        );
        Ok(position)
    }

    /// Record a confirmed exit fill. Idempotent: a concurrent or repeated
    /// close settles on whichever exit was recorded first.
    pub async fn record_close(
        &self,
        position_id: Uuid,
        fill: &Fill,
        reason: CloseReason,
    ) -> EngineResult<Position> {
        match self.store.close_if_open(position_id, fill, reason).await? {
            CloseOutcome::Closed(position) => {
                info!(
                    position_id = %position.id,
                    token = %position.token_symbol,
                    reason = ?reason,
                    exit_price = fill.price,
                    realized_pnl = position.realized_pnl,
                    "Position closed"
                );
                Ok(position)
            }
            CloseOutcome::AlreadyClosed(position) => {
                warn!(
                    position_id = %position.id,
                    attempted_reason = ?reason,
                    recorded_reason = ?position.close_reason,
                    "Close raced an earlier close; keeping first exit"
                );
                Ok(position)
            }
        }
    }

    pub async fn open_positions(&self) -> EngineResult<Vec<Position>> {
        Ok(self.store.find_open().await?)
    }

    pub async fn find_by_signal(
        &self,
        deployment_id: Uuid,
        signal_id: Uuid,
    ) -> EngineResult<Option<Position>> {
        Ok(self.store.find_by_signal(deployment_id, signal_id).await?)
    }

    /// Persist a new high-water mark; returns the stored mark, which never
    /// moves in the unfavorable direction.
    pub async fn raise_high_water_mark(
        &self,
        position: &Position,
        candidate: f64,
    ) -> EngineResult<f64> {
        Ok(self
            .store
            .raise_high_water_mark(position.id, position.side, candidate)
            .await?)
    }
}
