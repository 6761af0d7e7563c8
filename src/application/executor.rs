//! Trade execution
//!
//! Turns a routed, validated signal into a confirmed on-venue position, and
//! open positions back into confirmed exits. All submissions for one wallet
//! are serialized through a per-wallet async lock so nonce ordering and
//! balance reads stay coherent. Every open is idempotent on (deployment,
//! signal): a duplicate submission returns the existing position instead of
//! opening a second one.
//!
//! A timed-out submission has an UNKNOWN outcome. It is never blindly
//! resubmitted; the caller re-enters through the idempotency check, and the
//! exit monitor reconciles venue state against the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::application::retry::{retry_transient, BackoffPolicy};
use crate::application::router::VenueRouter;
use crate::application::tracker::PositionTracker;
use crate::application::validator::PreTradeValidator;
use crate::domain::deployment::Deployment;
use crate::domain::position::{CloseReason, Fill, Position};
use crate::domain::signal::Signal;
use crate::domain::venue::Venue;
use crate::error::{EngineError, EngineResult};
use crate::ports::store::CatalogStore;
use crate::ports::venue::{AdapterError, CloseOrder, OpenOrder, VenueAdapter};

pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_SLIPPAGE_BPS: u16 = 100;
pub const DEFAULT_PLATFORM_FEE_USD: f64 = 0.0;

/// Result of processing one signal.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// A new position was opened from a confirmed fill.
    Opened(Position),
    /// The signal was already executed; the existing position is returned.
    Duplicate(Position),
}

impl ExecutionOutcome {
    pub fn position(&self) -> &Position {
        match self {
            ExecutionOutcome::Opened(p) | ExecutionOutcome::Duplicate(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub submit_timeout: Duration,
    pub slippage_bps: u16,
    /// Flat fee charged per open, folded into the entry fill's fees.
    pub platform_fee_usd: f64,
    pub backoff: BackoffPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            platform_fee_usd: DEFAULT_PLATFORM_FEE_USD,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Per-wallet submission locks. One wallet never has two in-flight
/// submissions, across venues.
#[derive(Default)]
struct WalletLocks {
    inner: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl WalletLocks {
    fn lock_for(&self, wallet: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(wallet.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

pub struct TradeExecutor {
    router: Arc<VenueRouter>,
    validator: Arc<PreTradeValidator>,
    tracker: Arc<PositionTracker>,
    catalog: Arc<dyn CatalogStore>,
    adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
    wallet_locks: WalletLocks,
    config: ExecutorConfig,
}

impl TradeExecutor {
    pub fn new(
        router: Arc<VenueRouter>,
        validator: Arc<PreTradeValidator>,
        tracker: Arc<PositionTracker>,
        catalog: Arc<dyn CatalogStore>,
        adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
    ) -> Self {
        Self {
            router,
            validator,
            tracker,
            catalog,
            adapters,
            wallet_locks: WalletLocks::default(),
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn adapter(&self, venue: Venue) -> EngineResult<&Arc<dyn VenueAdapter>> {
        self.adapters
            .get(&venue)
            .ok_or_else(|| EngineError::Adapter(format!("no adapter configured for {venue}")))
    }

    fn agent_for(deployment: &Deployment, venue: Venue) -> Option<String> {
        match venue {
            Venue::Hyperliquid => deployment.hyperliquid_agent.clone(),
            Venue::Ostium => deployment.ostium_agent.clone(),
            Venue::Spot => None,
        }
    }

    /// Execute a signal end to end: idempotency check, routing, validation,
    /// serialized submission, persistence.
    pub async fn execute(
        &self,
        signal: &Signal,
        deployment: &Deployment,
    ) -> EngineResult<ExecutionOutcome> {
        if !deployment.is_active() {
            return Err(EngineError::fatal(format!(
                "deployment {} is not active",
                deployment.id
            )));
        }

        // Fast-path idempotency check before any venue traffic.
        if let Some(existing) = self.tracker.find_by_signal(deployment.id, signal.id).await? {
            info!(signal_id = %signal.id, position_id = %existing.id, "Signal already executed");
            return Ok(ExecutionOutcome::Duplicate(existing));
        }

        let decision = self.router.route(signal, deployment).await?;
        let venue = decision
            .selected_venue
            .ok_or_else(|| EngineError::Adapter("routing returned no venue".into()))?;
        let adapter = self.adapter(venue)?;

        let validated = self
            .validator
            .validate(signal, deployment, venue, adapter.as_ref())
            .await?;

        let leverage = match validated.max_leverage {
            Some(cap) => signal.risk_model.leverage.min(cap),
            None => signal.risk_model.leverage,
        };
        let order = OpenOrder {
            wallet: deployment.user_wallet.clone(),
            agent: Self::agent_for(deployment, venue),
            token_symbol: signal.token_symbol.clone(),
            token_address: validated.token_address.clone(),
            side: signal.side,
            collateral_usd: validated.collateral_usd,
            leverage,
            slippage_bps: self.config.slippage_bps,
        };

        let lock = self.wallet_locks.lock_for(&deployment.user_wallet);
        let _guard = lock.lock().await;

        // Re-check under the lock: a racing submission of the same signal may
        // have landed while we waited.
        if let Some(existing) = self.tracker.find_by_signal(deployment.id, signal.id).await? {
            return Ok(ExecutionOutcome::Duplicate(existing));
        }

        let fill = self.submit_open(adapter.as_ref(), &order).await?;
        // The platform fee is charged on top of venue fees and reduces
        // realized PnL like any other entry cost.
        let fill = Fill {
            fees_usd: fill.fees_usd + self.config.platform_fee_usd,
            ..fill
        };

        let position = match self
            .tracker
            .record_open(signal, deployment.id, venue, &fill)
            .await
        {
            Ok(position) => position,
            Err(EngineError::StoreConflict) => {
                // Another process recorded the same signal first. The venue
                // now holds a duplicate exposure; surface loudly but return
                // the canonical position.
                error!(
                    signal_id = %signal.id,
                    tx_ref = %fill.tx_ref,
                    "Fill landed for an already-recorded signal"
                );
                let existing = self
                    .tracker
                    .find_by_signal(deployment.id, signal.id)
                    .await?
                    .ok_or(EngineError::StoreConflict)?;
                return Ok(ExecutionOutcome::Duplicate(existing));
            }
            Err(e) => return Err(e),
        };

        Ok(ExecutionOutcome::Opened(position))
    }

    async fn submit_open(
        &self,
        adapter: &dyn VenueAdapter,
        order: &OpenOrder,
    ) -> EngineResult<Fill> {
        let submission = retry_transient(&self.config.backoff, "submit_open", || {
            adapter.submit_open(order)
        });
        match tokio::time::timeout(self.config.submit_timeout, submission).await {
            Ok(Ok(fill)) => Ok(fill),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(EngineError::timeout("open submission")),
        }
    }

    /// Close an open position. If the venue reports no position, it was
    /// closed externally; the store is reconciled at `reference_price` so
    /// the book reflects reality.
    pub async fn close(
        &self,
        position: &Position,
        deployment: &Deployment,
        reason: CloseReason,
        reference_price: f64,
    ) -> EngineResult<Position> {
        let adapter = self.adapter(position.venue)?;
        let token_address = self
            .catalog
            .market(position.venue, &position.token_symbol)
            .await?
            .and_then(|m| m.token_address);
        let order = CloseOrder {
            wallet: deployment.user_wallet.clone(),
            agent: Self::agent_for(deployment, position.venue),
            token_symbol: position.token_symbol.clone(),
            token_address,
            side: position.side,
            qty: position.qty,
            reason,
        };

        let lock = self.wallet_locks.lock_for(&deployment.user_wallet);
        let _guard = lock.lock().await;

        let submission = retry_transient(&self.config.backoff, "submit_close", || {
            adapter.submit_close(&order)
        });
        let fill = match tokio::time::timeout(self.config.submit_timeout, submission).await {
            Ok(Ok(fill)) => fill,
            Ok(Err(AdapterError::PositionNotFound)) => {
                warn!(
                    position_id = %position.id,
                    token = %position.token_symbol,
                    "Venue reports no position; recording external close"
                );
                let synthetic =
                    Fill::new(position.qty, reference_price, "external");
                return self
                    .tracker
                    .record_close(position.id, &synthetic, CloseReason::External)
                    .await;
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(EngineError::timeout("close submission")),
        };

        self.tracker.record_close(position.id, &fill, reason).await
    }
}
