//! Venues and the venue catalog
//!
//! A venue is an execution destination (perpetuals platform or spot DEX
//! router). The catalog is a read-only registry of which tokens each venue
//! lists, with per-chain token addresses for module-executed venues.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution destinations supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Venue {
    Hyperliquid,
    Ostium,
    Spot,
}

impl Venue {
    /// Default routing priority when no per-deployment override exists.
    pub const DEFAULT_PRIORITY: [Venue; 3] = [Venue::Hyperliquid, Venue::Ostium, Venue::Spot];

    /// Venues executed through the delegated-authority wallet module rather
    /// than a venue-native order API.
    pub fn uses_wallet_module(&self) -> bool {
        matches!(self, Venue::Spot)
    }

    /// Whether the venue allows multiple concurrent positions on the same
    /// token for one deployment.
    pub fn supports_stacking(&self) -> bool {
        false
    }

    /// Whether the venue requires per-wallet token whitelisting (module
    /// venues enforce a token whitelist inside the wallet module).
    pub fn requires_wallet_whitelist(&self) -> bool {
        self.uses_wallet_module()
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Venue::Hyperliquid => "HYPERLIQUID",
            Venue::Ostium => "OSTIUM",
            Venue::Spot => "SPOT",
        };
        write!(f, "{}", s)
    }
}

/// Venue requested by a signal: either a specific venue or "route for me".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedVenue {
    Concrete(Venue),
    /// Multi-venue request: the router picks the first available venue in
    /// priority order.
    Any,
}

/// One (venue, token) listing in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueMarket {
    pub venue: Venue,
    pub token_symbol: String,
    /// Market is listed and currently tradeable.
    pub is_active: bool,
    /// On-chain token address, present for module-executed venues.
    pub token_address: Option<String>,
    pub min_position_usd: Option<f64>,
    pub max_leverage: Option<f64>,
}

impl VenueMarket {
    pub fn new(venue: Venue, token_symbol: impl Into<String>) -> Self {
        Self {
            venue,
            token_symbol: token_symbol.into(),
            is_active: true,
            token_address: None,
            min_position_usd: None,
            max_leverage: None,
        }
    }

    pub fn with_token_address(mut self, address: impl Into<String>) -> Self {
        self.token_address = Some(address.into());
        self
    }

    pub fn with_limits(mut self, min_position_usd: f64, max_leverage: f64) -> Self {
        self.min_position_usd = Some(min_position_usd);
        self.max_leverage = Some(max_leverage);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Availability verdict for one venue during routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueAvailability {
    pub venue: Venue,
    pub available: bool,
    pub reason: String,
}

impl VenueAvailability {
    pub fn available(venue: Venue, reason: impl Into<String>) -> Self {
        Self {
            venue,
            available: true,
            reason: reason.into(),
        }
    }

    pub fn unavailable(venue: Venue, reason: impl Into<String>) -> Self {
        Self {
            venue,
            available: false,
            reason: reason.into(),
        }
    }
}
