//! Venue Pilot - multi-venue signal execution and position lifecycle engine

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use venue_pilot::adapters::{
    DelegatedModuleAdapter, HyperliquidAdapter, InMemoryStore, OraclePriceFeed, OstiumAdapter,
    VenueServiceConfig,
};
use venue_pilot::application::{
    BackoffPolicy, ExecutionOutcome, ExecutorConfig, ExitMonitor, MonitorConfig, PositionTracker,
    PreTradeValidator, TradeExecutor, VenueCatalog, VenueRouter,
};
use venue_pilot::config::{load_config, Config};
use venue_pilot::domain::deployment::Deployment;
use venue_pilot::domain::signal::Signal;
use venue_pilot::domain::venue::{Venue, VenueMarket};
use venue_pilot::ports::store::{CatalogStore, DeploymentStore};
use venue_pilot::ports::venue::VenueAdapter;

#[derive(Parser)]
#[command(name = "venue-pilot", about = "Signal execution and position lifecycle engine")]
struct Cli {
    /// Path to config.toml
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Seed file with markets and deployments (JSON)
    #[arg(short, long, default_value = "seed.json")]
    seed: PathBuf,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the exit monitor loop
    Run,
    /// Execute one signal from a JSON file
    Execute {
        /// Path to signal JSON
        #[arg(long)]
        signal: PathBuf,
        /// Deployment id to execute under
        #[arg(long)]
        deployment: uuid::Uuid,
    },
    /// List catalog markets
    Markets,
    /// Probe venue service health
    Health,
    /// Routing quality over the trailing day
    Stats,
}

/// Seed data loaded at startup; a durable store replaces this in production.
#[derive(serde::Deserialize)]
struct Seed {
    #[serde(default)]
    markets: Vec<VenueMarket>,
    #[serde(default)]
    deployments: Vec<Deployment>,
}

struct Engine {
    store: Arc<InMemoryStore>,
    tracker: Arc<PositionTracker>,
    router: Arc<VenueRouter>,
    executor: Arc<TradeExecutor>,
    adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env holds secrets (API keys); config.toml holds everything else.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = load_config(&cli.config).context("Failed to load configuration")?;
    let engine = build_engine(config, &cli.seed).await?;

    match cli.command {
        Command::Run => run_monitor(engine).await,
        Command::Execute { signal, deployment } => execute_signal(engine, signal, deployment).await,
        Command::Markets => list_markets(engine).await,
        Command::Health => probe_health(engine).await,
        Command::Stats => routing_stats(engine).await,
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();
    Ok(())
}

async fn build_engine(config: Config, seed_path: &PathBuf) -> Result<Engine> {
    let store = Arc::new(InMemoryStore::new());

    if seed_path.exists() {
        let raw = std::fs::read_to_string(seed_path).context("Failed to read seed file")?;
        let seed: Seed = serde_json::from_str(&raw).context("Failed to parse seed file")?;
        for market in seed.markets {
            store.upsert_market(market).await?;
        }
        for deployment in seed.deployments {
            store.upsert_deployment(deployment).await?;
        }
    } else {
        tracing::warn!(path = %seed_path.display(), "No seed file; catalog starts empty");
    }

    let timeout = Duration::from_secs(config.venues.request_timeout_secs);
    let service_config = |url: &str| {
        let mut c = VenueServiceConfig::new(url).with_timeout(timeout);
        if let Some(key) = config.venues.api_key() {
            c = c.with_api_key(key);
        }
        c
    };

    let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
    adapters.insert(
        Venue::Hyperliquid,
        Arc::new(
            HyperliquidAdapter::new(service_config(&config.venues.hyperliquid_url))
                .context("Failed to create Hyperliquid adapter")?,
        ),
    );
    adapters.insert(
        Venue::Ostium,
        Arc::new(
            OstiumAdapter::new(service_config(&config.venues.ostium_url))
                .context("Failed to create Ostium adapter")?,
        ),
    );
    adapters.insert(
        Venue::Spot,
        Arc::new(
            DelegatedModuleAdapter::new(service_config(&config.venues.module_url))
                .context("Failed to create module adapter")?,
        ),
    );

    let catalog = Arc::new(VenueCatalog::new(store.clone()));
    let router = Arc::new(VenueRouter::new(catalog, store.clone()));
    let validator = Arc::new(
        PreTradeValidator::new(store.clone(), store.clone())
            .with_platform_fee(config.execution.platform_fee_usd),
    );
    let tracker = Arc::new(PositionTracker::new(store.clone()));
    let executor = Arc::new(
        TradeExecutor::new(
            router.clone(),
            validator,
            tracker.clone(),
            store.clone(),
            adapters.clone(),
        )
        .with_config(ExecutorConfig {
            submit_timeout: Duration::from_secs(config.execution.submit_timeout_secs),
            slippage_bps: config.execution.slippage_bps,
            platform_fee_usd: config.execution.platform_fee_usd,
            backoff: BackoffPolicy::default().with_max_attempts(config.execution.max_retries),
        }),
    );

    Ok(Engine {
        store,
        tracker,
        router,
        executor,
        adapters,
        config,
    })
}

async fn run_monitor(engine: Engine) -> Result<()> {
    let oracle = OraclePriceFeed::new(VenueServiceConfig::new(engine.config.oracle.get_url()))
        .context("Failed to create price oracle")?;
    let monitor = Arc::new(
        ExitMonitor::new(
            engine.tracker.clone(),
            engine.executor.clone(),
            Arc::new(oracle),
            engine.store.clone(),
        )
        .with_config(MonitorConfig {
            tick_interval: Duration::from_secs(engine.config.monitor.tick_interval_secs),
            max_concurrent: engine.config.monitor.max_concurrent,
            close_retry_budget: engine.config.monitor.close_retry_budget,
        }),
    );

    tokio::select! {
        _ = monitor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }
    Ok(())
}

async fn execute_signal(engine: Engine, signal_path: PathBuf, deployment_id: uuid::Uuid) -> Result<()> {
    let raw = std::fs::read_to_string(&signal_path).context("Failed to read signal file")?;
    let signal: Signal = serde_json::from_str(&raw).context("Failed to parse signal")?;
    let deployment = engine
        .store
        .deployment(deployment_id)
        .await?
        .context("Deployment not found in seed data")?;

    match engine.executor.execute(&signal, &deployment).await? {
        ExecutionOutcome::Opened(position) => {
            println!(
                "opened {} {:?} {} @ {} (qty {}, tx {})",
                position.venue,
                position.side,
                position.token_symbol,
                position.entry_price,
                position.qty,
                position.entry_tx_ref
            );
        }
        ExecutionOutcome::Duplicate(position) => {
            println!(
                "signal already executed: position {} ({})",
                position.id, position.token_symbol
            );
        }
    }
    Ok(())
}

async fn list_markets(engine: Engine) -> Result<()> {
    let mut markets = engine.store.list_markets().await?;
    markets.sort_by(|a, b| {
        a.token_symbol
            .cmp(&b.token_symbol)
            .then(a.venue.to_string().cmp(&b.venue.to_string()))
    });
    for m in markets {
        println!(
            "{:<12} {:<12} active={} min_usd={:?} max_lev={:?}",
            m.token_symbol, m.venue.to_string(), m.is_active, m.min_position_usd, m.max_leverage
        );
    }
    Ok(())
}

async fn probe_health(engine: Engine) -> Result<()> {
    for (venue, adapter) in &engine.adapters {
        let healthy = adapter.health().await;
        println!("{venue}: {}", if healthy { "ok" } else { "unreachable" });
    }
    Ok(())
}

async fn routing_stats(engine: Engine) -> Result<()> {
    let stats = engine.router.stats(24).await?;
    println!(
        "decisions={} selections={} selection_ratio={:.2} avg_latency_ms={:.1}",
        stats.decisions,
        stats.selections,
        stats.selection_ratio(),
        stats.avg_latency_ms
    );
    let mut venues: Vec<_> = stats.per_venue.iter().collect();
    venues.sort_by_key(|(venue, _)| venue.to_string());
    for (venue, v) in venues {
        println!(
            "{:<12} checked={} selections={} selection_ratio={:.2} avg_latency_ms={:.1}",
            venue.to_string(),
            v.checked,
            v.selections,
            v.selection_ratio(),
            v.avg_latency_ms
        );
    }
    Ok(())
}
