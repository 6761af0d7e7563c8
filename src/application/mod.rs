//! Application layer - use-case orchestration over domain and ports
//!
//! Signal intake flows router -> validator -> executor -> tracker; the exit
//! monitor drives the position lifecycle from the other side.

pub mod catalog;
pub mod executor;
pub mod monitor;
pub mod retry;
pub mod router;
pub mod tracker;
pub mod validator;

pub use catalog::VenueCatalog;
pub use executor::{ExecutionOutcome, ExecutorConfig, TradeExecutor};
pub use monitor::{ExitMonitor, MonitorConfig};
pub use retry::BackoffPolicy;
pub use router::VenueRouter;
pub use tracker::PositionTracker;
pub use validator::{PreTradeValidator, ValidatedTrade};
