//! Ports layer - trait seams for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - Storage repositories (positions, catalog, routing decisions, deployments)
//! - Venue execution (module-executed and API-executed venues)
//! - Reference prices

pub mod mocks;
pub mod price;
pub mod store;
pub mod venue;

pub use price::{PriceFeed, PriceFeedError};
pub use store::{
    CatalogStore, CloseOutcome, DeploymentStore, PositionStore, RoutingDecisionStore, StoreError,
};
pub use venue::{AdapterError, CloseOrder, OpenOrder, VenueAdapter};
