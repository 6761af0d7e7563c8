//! Pre-trade validation
//!
//! Four ordered checks between routing and execution. The first failure
//! wins and is returned as a typed [`RejectReason`]; nothing is submitted
//! to a venue until all four pass.
//!
//! 1. token whitelisted for the wallet (module venues only)
//! 2. execution credentials in place for the selected venue
//! 3. no open position on (deployment, token) unless the venue stacks
//! 4. computed size within balance and above the market minimum

use std::sync::Arc;

use tracing::debug;

use crate::domain::deployment::Deployment;
use crate::domain::signal::Signal;
use crate::domain::venue::Venue;
use crate::error::{EngineError, EngineResult, RejectReason};
use crate::ports::store::{CatalogStore, PositionStore};
use crate::ports::venue::VenueAdapter;

/// Result of a passed validation: everything the executor needs to build
/// the order without re-deriving sizes.
#[derive(Debug, Clone)]
pub struct ValidatedTrade {
    pub venue: Venue,
    pub collateral_usd: f64,
    pub balance_usd: f64,
    pub token_address: Option<String>,
    pub min_position_usd: Option<f64>,
    pub max_leverage: Option<f64>,
}

pub struct PreTradeValidator {
    catalog: Arc<dyn CatalogStore>,
    positions: Arc<dyn PositionStore>,
    /// Flat platform fee charged on every open, on top of collateral.
    platform_fee_usd: f64,
}

impl PreTradeValidator {
    pub fn new(catalog: Arc<dyn CatalogStore>, positions: Arc<dyn PositionStore>) -> Self {
        Self {
            catalog,
            positions,
            platform_fee_usd: 0.0,
        }
    }

    pub fn with_platform_fee(mut self, platform_fee_usd: f64) -> Self {
        self.platform_fee_usd = platform_fee_usd;
        self
    }

    pub async fn validate(
        &self,
        signal: &Signal,
        deployment: &Deployment,
        venue: Venue,
        adapter: &dyn VenueAdapter,
    ) -> EngineResult<ValidatedTrade> {
        // 1. per-wallet token whitelist (module venues enforce one on-chain;
        //    check it first so a blocked token fails fast, before balance RPC).
        if venue.requires_wallet_whitelist() {
            let whitelisted = self
                .catalog
                .is_wallet_whitelisted(&deployment.user_wallet, &signal.token_symbol)
                .await?;
            if !whitelisted {
                return Err(EngineError::ValidationRejected(
                    RejectReason::TokenNotWhitelisted {
                        venue,
                        token: signal.token_symbol.clone(),
                    },
                ));
            }
        }

        // 2. execution credentials. The router already checked this, but the
        //    deployment may have been paused or revoked between routing and
        //    execution.
        if !deployment.credentials_for(venue) {
            return Err(EngineError::ValidationRejected(RejectReason::ModuleDisabled {
                venue,
            }));
        }

        // 3. open-position exclusivity per (deployment, token).
        if !venue.supports_stacking() {
            let existing = self
                .positions
                .find_open_for_token(deployment.id, &signal.token_symbol)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ValidationRejected(
                    RejectReason::PositionAlreadyOpen {
                        token: signal.token_symbol.clone(),
                    },
                ));
            }
        }

        // 4. sizing against live balance (including the platform fee) and
        //    the market minimum.
        let balance_usd = adapter.balance_usd(&deployment.user_wallet).await?;
        let collateral_usd = signal.size_model.compute_size(balance_usd);
        let required_usd = collateral_usd + self.platform_fee_usd;
        if required_usd > balance_usd {
            return Err(EngineError::ValidationRejected(
                RejectReason::InsufficientBalance {
                    required_usd,
                    available_usd: balance_usd,
                },
            ));
        }

        let market = self.catalog.market(venue, &signal.token_symbol).await?;
        let min_position_usd = market.as_ref().and_then(|m| m.min_position_usd);
        if let Some(min_usd) = min_position_usd {
            if collateral_usd < min_usd {
                return Err(EngineError::ValidationRejected(RejectReason::SizeTooSmall {
                    size_usd: collateral_usd,
                    min_usd,
                }));
            }
        }

        debug!(
            token = %signal.token_symbol,
            venue = %venue,
            collateral_usd,
            balance_usd,
            "Pre-trade validation passed"
        );
        let max_leverage = market.as_ref().and_then(|m| m.max_leverage);
        Ok(ValidatedTrade {
            venue,
            collateral_usd,
            balance_usd,
            token_address: market.and_then(|m| m.token_address),
            min_position_usd,
            max_leverage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::position::{Fill, Position, RiskSnapshot};
    use crate::domain::signal::{RiskModel, Side, SizeModel};
    use crate::domain::venue::{RequestedVenue, VenueMarket};
    use crate::ports::mocks::MockVenueAdapter;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryStore>,
        validator: PreTradeValidator,
        deployment: Deployment,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_market(VenueMarket::new(Venue::Hyperliquid, "ETH").with_limits(10.0, 25.0))
            .await
            .unwrap();
        store
            .upsert_market(
                VenueMarket::new(Venue::Spot, "PEPE")
                    .with_token_address("0xToken")
                    .with_limits(1.0, 1.0),
            )
            .await
            .unwrap();
        let validator = PreTradeValidator::new(store.clone(), store.clone());
        let deployment = Deployment::new(Uuid::new_v4(), "0xwallet")
            .with_module_enabled()
            .with_hyperliquid_agent("0xhl");
        Harness {
            store,
            validator,
            deployment,
        }
    }

    fn signal(token: &str, size: SizeModel) -> Signal {
        Signal::new(
            Uuid::new_v4(),
            token,
            Side::Long,
            RequestedVenue::Any,
            size,
            RiskModel::stop_loss_only(10.0),
        )
    }

    #[tokio::test]
    async fn test_happy_path_returns_sizing() {
        let h = harness().await;
        let adapter = MockVenueAdapter::new(Venue::Hyperliquid).with_balance("0xwallet", 1000.0);
        let validated = h
            .validator
            .validate(
                &signal("ETH", SizeModel::BalancePercent(10.0)),
                &h.deployment,
                Venue::Hyperliquid,
                &adapter,
            )
            .await
            .unwrap();
        assert!((validated.collateral_usd - 100.0).abs() < 1e-9);
        assert!((validated.balance_usd - 1000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_blocked_token_rejected_before_balance_call() {
        let h = harness().await;
        h.store.block_wallet_token("0xwallet", "PEPE");
        // No balance scripted: if the balance check ran first it would win
        // with InsufficientBalance, so the whitelist rejection proves order.
        let adapter = MockVenueAdapter::new(Venue::Spot);
        let err = h
            .validator
            .validate(
                &signal("PEPE", SizeModel::FixedUsd(50.0)),
                &h.deployment,
                Venue::Spot,
                &adapter,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ValidationRejected(RejectReason::TokenNotWhitelisted { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let h = harness().await;
        let adapter = MockVenueAdapter::new(Venue::Ostium).with_balance("0xwallet", 1000.0);
        // Deployment has no Ostium agent.
        let err = h
            .validator
            .validate(
                &signal("ETH", SizeModel::FixedUsd(50.0)),
                &h.deployment,
                Venue::Ostium,
                &adapter,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ValidationRejected(RejectReason::ModuleDisabled { venue: Venue::Ostium })
        ));
    }

    #[tokio::test]
    async fn test_open_position_blocks_new_trade() {
        let h = harness().await;
        let risk =
            RiskSnapshot::from_risk_model(&RiskModel::stop_loss_only(10.0), Side::Long, 100.0);
        let position = Position::open(
            Uuid::new_v4(),
            h.deployment.id,
            Venue::Hyperliquid,
            "ETH",
            Side::Long,
            &Fill::new(1.0, 100.0, "0xentry"),
            risk,
        )
        .unwrap();
        h.store.insert_open(position).await.unwrap();

        let adapter = MockVenueAdapter::new(Venue::Hyperliquid).with_balance("0xwallet", 1000.0);
        let err = h
            .validator
            .validate(
                &signal("ETH", SizeModel::FixedUsd(50.0)),
                &h.deployment,
                Venue::Hyperliquid,
                &adapter,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ValidationRejected(RejectReason::PositionAlreadyOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected() {
        let h = harness().await;
        let adapter = MockVenueAdapter::new(Venue::Hyperliquid).with_balance("0xwallet", 20.0);
        let err = h
            .validator
            .validate(
                &signal("ETH", SizeModel::FixedUsd(55.0)),
                &h.deployment,
                Venue::Hyperliquid,
                &adapter,
            )
            .await
            .unwrap_err();
        match err {
            EngineError::ValidationRejected(RejectReason::InsufficientBalance {
                required_usd,
                available_usd,
            }) => {
                assert!((required_usd - 55.0).abs() < 1e-9);
                assert!((available_usd - 20.0).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_platform_fee_counts_against_balance() {
        let h = harness().await;
        let validator = PreTradeValidator::new(h.store.clone(), h.store.clone())
            .with_platform_fee(2.0);
        // Collateral alone fits the balance; collateral plus fee does not.
        let adapter = MockVenueAdapter::new(Venue::Hyperliquid).with_balance("0xwallet", 50.0);
        let err = validator
            .validate(
                &signal("ETH", SizeModel::FixedUsd(49.0)),
                &h.deployment,
                Venue::Hyperliquid,
                &adapter,
            )
            .await
            .unwrap_err();
        match err {
            EngineError::ValidationRejected(RejectReason::InsufficientBalance {
                required_usd,
                available_usd,
            }) => {
                assert!((required_usd - 51.0).abs() < 1e-9);
                assert!((available_usd - 50.0).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_size_below_market_minimum_rejected() {
        let h = harness().await;
        let adapter = MockVenueAdapter::new(Venue::Hyperliquid).with_balance("0xwallet", 1000.0);
        let err = h
            .validator
            .validate(
                // 0.5% of 1000 = 5 USD, below the 10 USD market minimum.
                &signal("ETH", SizeModel::BalancePercent(0.5)),
                &h.deployment,
                Venue::Hyperliquid,
                &adapter,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ValidationRejected(RejectReason::SizeTooSmall { .. })
        ));
    }
}
