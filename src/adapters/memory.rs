//! In-memory store
//!
//! One explicitly constructed store handle implementing every repository
//! port. Ships with the crate for tests and paper trading; a relational
//! backend must provide the same guarantees: unique open position per
//! (deployment, token, signal), conditional close, monotonic high-water-mark.
//!
//! Locks are held only for the map operation itself, never across awaits.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::deployment::Deployment;
use crate::domain::position::{CloseReason, Fill, Position};
use crate::domain::routing::VenueRoutingDecision;
use crate::domain::signal::Side;
use crate::domain::venue::{Venue, VenueMarket};
use crate::ports::store::{
    CatalogStore, CloseOutcome, DeploymentStore, PositionStore, RoutingDecisionStore, StoreError,
};

#[derive(Default)]
pub struct InMemoryStore {
    positions: Mutex<HashMap<Uuid, Position>>,
    markets: Mutex<HashMap<(Venue, String), VenueMarket>>,
    /// (wallet, token) pairs explicitly blocked from per-wallet whitelists.
    wallet_blocklist: Mutex<Vec<(String, String)>>,
    decisions: Mutex<Vec<VenueRoutingDecision>>,
    deployments: Mutex<HashMap<Uuid, Deployment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block a (wallet, token) pair from per-wallet whitelisting.
    pub fn block_wallet_token(&self, wallet: &str, token_symbol: &str) {
        self.wallet_blocklist
            .lock()
            .unwrap()
            .push((wallet.to_string(), token_symbol.to_string()));
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.lock().unwrap().len()
    }
}

#[async_trait]
impl PositionStore for InMemoryStore {
    async fn insert_open(&self, position: Position) -> Result<Position, StoreError> {
        let mut positions = self.positions.lock().unwrap();
        let duplicate = positions.values().any(|p| {
            p.is_open()
                && p.deployment_id == position.deployment_id
                && p.signal_id == position.signal_id
                && p.token_symbol == position.token_symbol
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        positions.insert(position.id, position.clone());
        Ok(position)
    }

    async fn position(&self, id: Uuid) -> Result<Option<Position>, StoreError> {
        Ok(self.positions.lock().unwrap().get(&id).cloned())
    }

    async fn find_open(&self) -> Result<Vec<Position>, StoreError> {
        let mut open: Vec<Position> = self
            .positions
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|p| p.opened_at);
        Ok(open)
    }

    async fn find_open_for_token(
        &self,
        deployment_id: Uuid,
        token_symbol: &str,
    ) -> Result<Option<Position>, StoreError> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .values()
            .find(|p| {
                p.is_open() && p.deployment_id == deployment_id && p.token_symbol == token_symbol
            })
            .cloned())
    }

    async fn find_by_signal(
        &self,
        deployment_id: Uuid,
        signal_id: Uuid,
    ) -> Result<Option<Position>, StoreError> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .values()
            .find(|p| p.deployment_id == deployment_id && p.signal_id == signal_id)
            .cloned())
    }

    async fn close_if_open(
        &self,
        id: Uuid,
        fill: &Fill,
        reason: CloseReason,
    ) -> Result<CloseOutcome, StoreError> {
        let mut positions = self.positions.lock().unwrap();
        let position = positions.get_mut(&id).ok_or(StoreError::NotFound)?;
        if !position.is_open() {
            return Ok(CloseOutcome::AlreadyClosed(position.clone()));
        }
        position
            .apply_close(fill, reason)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(CloseOutcome::Closed(position.clone()))
    }

    async fn raise_high_water_mark(
        &self,
        id: Uuid,
        side: Side,
        candidate: f64,
    ) -> Result<f64, StoreError> {
        let mut positions = self.positions.lock().unwrap();
        let position = positions.get_mut(&id).ok_or(StoreError::NotFound)?;
        if side.is_favorable(candidate, position.risk.high_water_mark) {
            position.risk.high_water_mark = candidate;
        }
        Ok(position.risk.high_water_mark)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn market(
        &self,
        venue: Venue,
        token_symbol: &str,
    ) -> Result<Option<VenueMarket>, StoreError> {
        Ok(self
            .markets
            .lock()
            .unwrap()
            .get(&(venue, token_symbol.to_string()))
            .cloned())
    }

    async fn upsert_market(&self, market: VenueMarket) -> Result<(), StoreError> {
        self.markets
            .lock()
            .unwrap()
            .insert((market.venue, market.token_symbol.clone()), market);
        Ok(())
    }

    async fn list_markets(&self) -> Result<Vec<VenueMarket>, StoreError> {
        Ok(self.markets.lock().unwrap().values().cloned().collect())
    }

    async fn is_wallet_whitelisted(
        &self,
        wallet: &str,
        token_symbol: &str,
    ) -> Result<bool, StoreError> {
        let blocked = self
            .wallet_blocklist
            .lock()
            .unwrap()
            .iter()
            .any(|(w, t)| w == wallet && t == token_symbol);
        Ok(!blocked)
    }
}

#[async_trait]
impl RoutingDecisionStore for InMemoryStore {
    async fn append(&self, decision: VenueRoutingDecision) -> Result<(), StoreError> {
        self.decisions.lock().unwrap().push(decision);
        Ok(())
    }

    async fn decisions_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<VenueRoutingDecision>, StoreError> {
        Ok(self
            .decisions
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.created_at >= cutoff)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeploymentStore for InMemoryStore {
    async fn deployment(&self, id: Uuid) -> Result<Option<Deployment>, StoreError> {
        Ok(self.deployments.lock().unwrap().get(&id).cloned())
    }

    async fn upsert_deployment(&self, deployment: Deployment) -> Result<(), StoreError> {
        self.deployments
            .lock()
            .unwrap()
            .insert(deployment.id, deployment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::RiskSnapshot;
    use crate::domain::signal::RiskModel;

    fn open_position(deployment_id: Uuid, signal_id: Uuid) -> Position {
        let risk =
            RiskSnapshot::from_risk_model(&RiskModel::stop_loss_only(10.0), Side::Long, 100.0);
        let mut p = Position::open(
            signal_id,
            deployment_id,
            Venue::Hyperliquid,
            "ETH",
            Side::Long,
            &Fill::new(1.0, 100.0, "0xentry"),
            risk,
        )
        .unwrap();
        p.id = Uuid::new_v4();
        p
    }

    #[tokio::test]
    async fn test_duplicate_open_conflicts() {
        let store = InMemoryStore::new();
        let (dep, sig) = (Uuid::new_v4(), Uuid::new_v4());

        store.insert_open(open_position(dep, sig)).await.unwrap();
        let result = store.insert_open(open_position(dep, sig)).await;
        assert!(matches!(result, Err(StoreError::Conflict)));

        // Different signal is fine for a different token, conflict logic is
        // keyed on (deployment, signal, token).
        let other = open_position(dep, Uuid::new_v4());
        store.insert_open(other).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_if_open_is_idempotent() {
        let store = InMemoryStore::new();
        let p = store
            .insert_open(open_position(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let first = store
            .close_if_open(p.id, &Fill::new(1.0, 110.0, "0xexit"), CloseReason::TakeProfit)
            .await
            .unwrap();
        assert!(matches!(first, CloseOutcome::Closed(_)));

        // Second close with different data is a no-op.
        let second = store
            .close_if_open(p.id, &Fill::new(1.0, 50.0, "0xlate"), CloseReason::StopLoss)
            .await
            .unwrap();
        match second {
            CloseOutcome::AlreadyClosed(pos) => {
                assert_eq!(pos.exit_price, Some(110.0));
                assert_eq!(pos.close_reason, Some(CloseReason::TakeProfit));
            }
            CloseOutcome::Closed(_) => panic!("second close must be a no-op"),
        }
    }

    #[tokio::test]
    async fn test_high_water_mark_monotonic() {
        let store = InMemoryStore::new();
        let p = store
            .insert_open(open_position(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(
            store
                .raise_high_water_mark(p.id, Side::Long, 104.0)
                .await
                .unwrap(),
            104.0
        );
        // Lower candidate does not move the mark.
        assert_eq!(
            store
                .raise_high_water_mark(p.id, Side::Long, 101.0)
                .await
                .unwrap(),
            104.0
        );
        assert_eq!(
            store
                .raise_high_water_mark(p.id, Side::Long, 106.0)
                .await
                .unwrap(),
            106.0
        );
    }

    #[tokio::test]
    async fn test_find_open_excludes_closed() {
        let store = InMemoryStore::new();
        let p = store
            .insert_open(open_position(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(store.find_open().await.unwrap().len(), 1);

        store
            .close_if_open(p.id, &Fill::new(1.0, 110.0, "0xexit"), CloseReason::Manual)
            .await
            .unwrap();
        assert!(store.find_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_whitelist_default_allows() {
        let store = InMemoryStore::new();
        assert!(store.is_wallet_whitelisted("0xw", "ETH").await.unwrap());
        store.block_wallet_token("0xw", "ETH");
        assert!(!store.is_wallet_whitelisted("0xw", "ETH").await.unwrap());
        assert!(store.is_wallet_whitelisted("0xw", "BTC").await.unwrap());
    }

    #[tokio::test]
    async fn test_catalog_roundtrip() {
        let store = InMemoryStore::new();
        store
            .upsert_market(VenueMarket::new(Venue::Ostium, "EURUSD"))
            .await
            .unwrap();
        let market = store.market(Venue::Ostium, "EURUSD").await.unwrap();
        assert!(market.is_some());
        assert!(store.market(Venue::Spot, "EURUSD").await.unwrap().is_none());
    }
}
