//! Adapters layer - concrete implementations of the port traits
//!
//! - `memory`: in-process store for tests and paper trading
//! - `venue_http`: shared HTTP client for venue execution services
//! - `hyperliquid`, `ostium`: API-executed perp venues
//! - `module`: delegated on-chain module for spot execution
//! - `oracle`: reference price feed

pub mod hyperliquid;
pub mod memory;
pub mod module;
pub mod oracle;
pub mod ostium;
pub mod venue_http;

pub use hyperliquid::HyperliquidAdapter;
pub use memory::InMemoryStore;
pub use module::DelegatedModuleAdapter;
pub use oracle::OraclePriceFeed;
pub use ostium::OstiumAdapter;
pub use venue_http::{VenueServiceClient, VenueServiceConfig};
