//! Core business types: signals, positions, deployments, venues, routing
//! decisions and the exit-condition state machine.

pub mod deployment;
pub mod exit;
pub mod position;
pub mod routing;
pub mod signal;
pub mod venue;

pub use deployment::{Deployment, DeploymentStatus};
pub use exit::{ExitDecision, ExitState, ExitTracker};
pub use position::{CloseReason, Fill, Position, PositionError, RiskSnapshot};
pub use routing::{RoutingReason, VenueRoutingDecision, VenueRoutingStats};
pub use signal::{RiskModel, Side, Signal, SizeModel};
pub use venue::{RequestedVenue, Venue, VenueAvailability, VenueMarket};
