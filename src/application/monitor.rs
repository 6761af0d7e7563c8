//! Exit monitor
//!
//! Periodically evaluates every open position against the latest reference
//! price and submits closes when a stop-loss, take-profit or trailing stop
//! triggers. One position failing (bad price, venue error) never blocks the
//! rest of the pass.
//!
//! Close attempts have a bounded retry budget. A position that exhausts it
//! stays on the book, is skipped by further passes and is surfaced through
//! [`ExitMonitor::stuck_positions`] for operator intervention.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::executor::TradeExecutor;
use crate::application::tracker::PositionTracker;
use crate::domain::exit::{ExitDecision, ExitTracker};
use crate::domain::position::{CloseReason, Fill, Position};
use crate::error::EngineResult;
use crate::ports::price::PriceFeed;
use crate::ports::store::DeploymentStore;

pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT: usize = 8;
pub const DEFAULT_CLOSE_RETRY_BUDGET: u32 = 3;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub tick_interval: Duration,
    /// Positions evaluated concurrently per pass.
    pub max_concurrent: usize,
    /// Failed close attempts tolerated before a position is marked stuck.
    pub close_retry_budget: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            close_retry_budget: DEFAULT_CLOSE_RETRY_BUDGET,
        }
    }
}

pub struct ExitMonitor {
    tracker: Arc<PositionTracker>,
    executor: Arc<TradeExecutor>,
    price_feed: Arc<dyn PriceFeed>,
    deployments: Arc<dyn DeploymentStore>,
    config: MonitorConfig,
    /// In-memory exit state per open position, rebuilt from the store on
    /// restart (the high-water mark is persisted; armed/closing states are
    /// re-derived on the next observation).
    exit_state: Mutex<HashMap<Uuid, ExitTracker>>,
    close_attempts: Mutex<HashMap<Uuid, u32>>,
    stuck: Mutex<HashSet<Uuid>>,
}

impl ExitMonitor {
    pub fn new(
        tracker: Arc<PositionTracker>,
        executor: Arc<TradeExecutor>,
        price_feed: Arc<dyn PriceFeed>,
        deployments: Arc<dyn DeploymentStore>,
    ) -> Self {
        Self {
            tracker,
            executor,
            price_feed,
            deployments,
            config: MonitorConfig::default(),
            exit_state: Mutex::new(HashMap::new()),
            close_attempts: Mutex::new(HashMap::new()),
            stuck: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Positions that exhausted their close-retry budget.
    pub fn stuck_positions(&self) -> Vec<Uuid> {
        self.stuck.lock().unwrap().iter().copied().collect()
    }

    /// Run forever, one pass per tick interval.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            "Exit monitor started"
        );
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = self.clone().tick().await {
                error!(error = %e, "Monitor pass failed");
            }
        }
    }

    /// One evaluation pass over all open positions.
    pub async fn tick(self: Arc<Self>) -> EngineResult<()> {
        let open = self.tracker.open_positions().await?;
        self.evict_departed(&open);
        debug!(open = open.len(), "Monitor pass");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = JoinSet::new();
        for position in open {
            if self.stuck.lock().unwrap().contains(&position.id) {
                continue;
            }
            let monitor = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                // Semaphore is never closed, acquire cannot fail.
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                monitor.evaluate(position).await;
            });
        }
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    /// Drop cached state for positions that are no longer open.
    fn evict_departed(&self, open: &[Position]) {
        let live: HashSet<Uuid> = open.iter().map(|p| p.id).collect();
        self.exit_state.lock().unwrap().retain(|id, _| live.contains(id));
        self.close_attempts.lock().unwrap().retain(|id, _| live.contains(id));
        self.stuck.lock().unwrap().retain(|id| live.contains(id));
    }

    /// Evaluate one position. Errors are logged, never propagated, so a bad
    /// position cannot stall the pass.
    async fn evaluate(&self, position: Position) {
        let price = match self.price_feed.latest_price(&position.token_symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    position_id = %position.id,
                    token = %position.token_symbol,
                    error = %e,
                    "No reference price; skipping until next pass"
                );
                return;
            }
        };

        // Venue-side reconciliation: a position closed by the user or by
        // liquidation disappears at the venue before we close it.
        match self.position_still_at_venue(&position).await {
            Some(true) | None => {}
            Some(false) => {
                info!(
                    position_id = %position.id,
                    token = %position.token_symbol,
                    "Position gone at venue; recording external close"
                );
                let synthetic = Fill::new(position.qty, price, "external");
                if let Err(e) = self
                    .tracker
                    .record_close(position.id, &synthetic, CloseReason::External)
                    .await
                {
                    error!(position_id = %position.id, error = %e, "External close failed");
                }
                return;
            }
        }

        // A tracker left in CLOSING by a failed attempt still owes its close;
        // retry it every tick until it lands or the budget runs out.
        let pending = {
            let mut states = self.exit_state.lock().unwrap();
            let state = states
                .entry(position.id)
                .or_insert_with(|| ExitTracker::from_position(&position));
            let decision = state.observe(price);
            debug!(
                position_id = %position.id,
                price,
                state = ?state.state(),
                hwm = state.high_water_mark(),
                "Evaluated"
            );
            match decision {
                ExitDecision::Close(reason) => Some(reason),
                ExitDecision::Hold => state.pending_close_reason(),
            }
        };

        self.persist_high_water_mark(&position).await;

        if let Some(reason) = pending {
            self.attempt_close(&position, reason, price).await;
        }
    }

    /// Ok(true/false) from the venue, None when the probe itself failed and
    /// the answer is unknown.
    async fn position_still_at_venue(&self, position: &Position) -> Option<bool> {
        let adapter = self.executor.adapter(position.venue).ok()?;
        let deployment = self
            .deployments
            .deployment(position.deployment_id)
            .await
            .ok()
            .flatten()?;
        match adapter
            .position_open(&deployment.user_wallet, &position.token_symbol)
            .await
        {
            Ok(open) => Some(open),
            Err(e) => {
                debug!(position_id = %position.id, error = %e, "Venue state probe failed");
                None
            }
        }
    }

    async fn persist_high_water_mark(&self, position: &Position) {
        let mark = {
            let states = self.exit_state.lock().unwrap();
            states.get(&position.id).map(|s| s.high_water_mark())
        };
        let Some(mark) = mark else { return };
        if mark == position.risk.high_water_mark {
            return;
        }
        if let Err(e) = self.tracker.raise_high_water_mark(position, mark).await {
            warn!(position_id = %position.id, error = %e, "High-water-mark persist failed");
        }
    }

    async fn attempt_close(&self, position: &Position, reason: CloseReason, price: f64) {
        let deployment = match self.deployments.deployment(position.deployment_id).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                error!(
                    position_id = %position.id,
                    deployment_id = %position.deployment_id,
                    "Deployment missing; cannot close"
                );
                self.record_close_failure(position.id);
                return;
            }
            Err(e) => {
                warn!(position_id = %position.id, error = %e, "Deployment lookup failed");
                self.record_close_failure(position.id);
                return;
            }
        };

        match self.executor.close(position, &deployment, reason, price).await {
            Ok(closed) => {
                info!(
                    position_id = %closed.id,
                    token = %closed.token_symbol,
                    reason = ?reason,
                    realized_pnl = closed.realized_pnl,
                    "Exit executed"
                );
                if let Some(state) = self.exit_state.lock().unwrap().get_mut(&position.id) {
                    state.mark_closed();
                }
                self.close_attempts.lock().unwrap().remove(&position.id);
            }
            Err(e) => {
                warn!(
                    position_id = %position.id,
                    reason = ?reason,
                    error = %e,
                    "Close attempt failed"
                );
                // Stay in CLOSING; next tick retries until the budget runs out.
                if let Some(state) = self.exit_state.lock().unwrap().get_mut(&position.id) {
                    state.mark_closing();
                }
                self.record_close_failure(position.id);
            }
        }
    }

    fn record_close_failure(&self, position_id: Uuid) {
        let mut attempts = self.close_attempts.lock().unwrap();
        let count = attempts.entry(position_id).or_insert(0);
        *count += 1;
        if *count >= self.config.close_retry_budget {
            error!(
                position_id = %position_id,
                attempts = *count,
                "Close retry budget exhausted; position needs operator attention"
            );
            self.stuck.lock().unwrap().insert(position_id);
        }
    }
}
