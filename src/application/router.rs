//! Venue router
//!
//! Resolves a signal's requested venue to a concrete execution destination.
//! Static requests are honored or fail; multi-venue requests walk the
//! deployment's priority order and take the first available venue. Every
//! attempt, successful or not, is appended to the routing audit trail.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::application::catalog::VenueCatalog;
use crate::domain::deployment::Deployment;
use crate::domain::routing::{RoutingReason, VenueRoutingDecision, VenueRoutingStats};
use crate::domain::signal::Signal;
use crate::domain::venue::{RequestedVenue, Venue};
use crate::error::{EngineError, EngineResult};
use crate::ports::store::RoutingDecisionStore;

pub struct VenueRouter {
    catalog: Arc<VenueCatalog>,
    decisions: Arc<dyn RoutingDecisionStore>,
}

impl VenueRouter {
    pub fn new(catalog: Arc<VenueCatalog>, decisions: Arc<dyn RoutingDecisionStore>) -> Self {
        Self { catalog, decisions }
    }

    /// Route a signal for a deployment. The returned decision always carries
    /// every candidate that was checked; `selected_venue` is None on failure,
    /// in which case the corresponding [`EngineError`] is also returned so
    /// callers do not have to re-derive it.
    pub async fn route(
        &self,
        signal: &Signal,
        deployment: &Deployment,
    ) -> EngineResult<VenueRoutingDecision> {
        let started = Instant::now();
        let mut checked = Vec::new();
        let mut selected = None;

        let (candidates, static_request): (Vec<Venue>, bool) = match signal.requested_venue {
            RequestedVenue::Concrete(venue) => (vec![venue], true),
            RequestedVenue::Any => (deployment.routing_priority(), false),
        };

        for venue in candidates {
            let availability = self
                .catalog
                .availability(deployment, venue, &signal.token_symbol)
                .await?;
            let available = availability.available;
            checked.push(availability);
            if available {
                selected = Some(venue);
                break;
            }
        }

        let reason = match (selected, static_request) {
            (Some(_), true) => RoutingReason::StaticVenue,
            (Some(_), false) => RoutingReason::FirstAvailable,
            (None, true) => RoutingReason::RequestedUnavailable,
            (None, false) => RoutingReason::NoneAvailable,
        };

        let decision = VenueRoutingDecision::new(
            signal.id,
            &signal.token_symbol,
            signal.requested_venue,
            checked,
            selected,
            reason,
            started.elapsed().as_millis() as u64,
        );
        // Audit persistence is best-effort: losing a record must not lose
        // the trade.
        if let Err(e) = self.decisions.append(decision.clone()).await {
            warn!(signal_id = %signal.id, error = %e, "Routing decision not persisted");
        }

        match selected {
            Some(venue) => {
                info!(
                    signal_id = %signal.id,
                    token = %signal.token_symbol,
                    venue = %venue,
                    latency_ms = decision.latency_ms,
                    "Routed signal"
                );
                Ok(decision)
            }
            None => {
                warn!(
                    signal_id = %signal.id,
                    token = %signal.token_symbol,
                    candidates = decision.checked.len(),
                    "No venue available"
                );
                Err(self.failure_error(signal, &decision))
            }
        }
    }

    fn failure_error(&self, signal: &Signal, decision: &VenueRoutingDecision) -> EngineError {
        match signal.concrete_venue() {
            Some(venue) => EngineError::VenueUnavailable {
                venue,
                token: signal.token_symbol.clone(),
            },
            None => EngineError::NoVenueAvailable {
                token: signal.token_symbol.clone(),
                checked: decision.checked.iter().map(|a| a.venue).collect(),
            },
        }
    }

    /// Routing quality over the trailing `window_hours` hours, overall and
    /// broken down by venue.
    pub async fn stats(&self, window_hours: i64) -> EngineResult<VenueRoutingStats> {
        let cutoff = Utc::now() - ChronoDuration::hours(window_hours);
        let decisions = self.decisions.decisions_since(cutoff).await?;
        Ok(VenueRoutingStats::aggregate(&decisions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::signal::{RiskModel, Side, SizeModel};
    use crate::domain::venue::VenueMarket;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryStore>,
        router: VenueRouter,
    }

    async fn harness(markets: Vec<VenueMarket>) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        for m in markets {
            use crate::ports::store::CatalogStore;
            store.upsert_market(m).await.unwrap();
        }
        let catalog = Arc::new(VenueCatalog::new(store.clone()));
        let router = VenueRouter::new(catalog, store.clone());
        Harness { store, router }
    }

    fn deployment_all_credentials() -> Deployment {
        Deployment::new(Uuid::new_v4(), "0xwallet")
            .with_module_enabled()
            .with_hyperliquid_agent("0xhl")
            .with_ostium_agent("0xos")
    }

    fn signal(token: &str, requested: RequestedVenue) -> Signal {
        Signal::new(
            Uuid::new_v4(),
            token,
            Side::Long,
            requested,
            SizeModel::BalancePercent(10.0),
            RiskModel::stop_loss_only(10.0),
        )
    }

    #[tokio::test]
    async fn test_multi_venue_takes_first_in_priority() {
        let h = harness(vec![
            VenueMarket::new(Venue::Hyperliquid, "ETH"),
            VenueMarket::new(Venue::Ostium, "ETH"),
        ])
        .await;
        let decision = h
            .router
            .route(&signal("ETH", RequestedVenue::Any), &deployment_all_credentials())
            .await
            .unwrap();
        assert_eq!(decision.selected_venue, Some(Venue::Hyperliquid));
        assert_eq!(decision.reason, RoutingReason::FirstAvailable);
        // Stops at the first available candidate.
        assert_eq!(decision.checked.len(), 1);
    }

    #[tokio::test]
    async fn test_falls_through_to_later_venue_with_audit() {
        // EURUSD only trades on Ostium; decision must cite why earlier
        // candidates lost.
        let h = harness(vec![VenueMarket::new(Venue::Ostium, "EURUSD")]).await;
        let decision = h
            .router
            .route(
                &signal("EURUSD", RequestedVenue::Any),
                &deployment_all_credentials(),
            )
            .await
            .unwrap();
        assert_eq!(decision.selected_venue, Some(Venue::Ostium));
        assert_eq!(decision.checked.len(), 2);
        assert!(!decision.checked[0].available);
        assert!(decision.checked[0].reason.contains("not listed"));
    }

    #[tokio::test]
    async fn test_static_request_not_rerouted() {
        // ETH is listed on Hyperliquid, but the signal pinned Ostium where it
        // is not listed. The router must fail rather than substitute.
        let h = harness(vec![VenueMarket::new(Venue::Hyperliquid, "ETH")]).await;
        let err = h
            .router
            .route(
                &signal("ETH", RequestedVenue::Concrete(Venue::Ostium)),
                &deployment_all_credentials(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::VenueUnavailable { venue: Venue::Ostium, .. }));
        // The failed attempt is still recorded.
        assert_eq!(h.store.decision_count(), 1);
    }

    #[tokio::test]
    async fn test_none_available_lists_all_candidates() {
        let h = harness(vec![]).await;
        let err = h
            .router
            .route(&signal("XYZ", RequestedVenue::Any), &deployment_all_credentials())
            .await
            .unwrap_err();
        match err {
            EngineError::NoVenueAvailable { checked, .. } => assert_eq!(checked.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.store.decision_count(), 1);
    }

    #[tokio::test]
    async fn test_deployment_priority_override() {
        let h = harness(vec![
            VenueMarket::new(Venue::Hyperliquid, "ETH"),
            VenueMarket::new(Venue::Ostium, "ETH"),
        ])
        .await;
        let dep = deployment_all_credentials()
            .with_venue_priority(vec![Venue::Ostium, Venue::Hyperliquid]);
        let decision = h
            .router
            .route(&signal("ETH", RequestedVenue::Any), &dep)
            .await
            .unwrap();
        assert_eq!(decision.selected_venue, Some(Venue::Ostium));
    }

    #[tokio::test]
    async fn test_routing_is_deterministic() {
        let h = harness(vec![
            VenueMarket::new(Venue::Hyperliquid, "ETH"),
            VenueMarket::new(Venue::Ostium, "ETH"),
        ])
        .await;
        let dep = deployment_all_credentials();
        for _ in 0..5 {
            let decision = h
                .router
                .route(&signal("ETH", RequestedVenue::Any), &dep)
                .await
                .unwrap();
            assert_eq!(decision.selected_venue, Some(Venue::Hyperliquid));
        }
    }

    #[tokio::test]
    async fn test_stats_over_window() {
        let h = harness(vec![VenueMarket::new(Venue::Hyperliquid, "ETH")]).await;
        let dep = deployment_all_credentials();
        h.router
            .route(&signal("ETH", RequestedVenue::Any), &dep)
            .await
            .unwrap();
        let _ = h
            .router
            .route(&signal("XYZ", RequestedVenue::Any), &dep)
            .await;

        let stats = h.router.stats(24).await.unwrap();
        assert_eq!(stats.decisions, 2);
        assert_eq!(stats.selections, 1);
        assert!((stats.selection_ratio() - 0.5).abs() < 1e-9);

        // ETH selected Hyperliquid; the XYZ miss checked it (and the rest)
        // without a selection.
        let hl = &stats.per_venue[&Venue::Hyperliquid];
        assert_eq!(hl.checked, 2);
        assert_eq!(hl.selections, 1);
        assert_eq!(stats.per_venue[&Venue::Ostium].selections, 0);
    }
}
