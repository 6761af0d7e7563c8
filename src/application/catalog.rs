//! Venue catalog
//!
//! Answers one question for the router: can this deployment trade this token
//! on this venue right now? Combines the market listing (exists, active) with
//! the deployment's execution credentials for that venue.

use std::sync::Arc;

use crate::domain::deployment::Deployment;
use crate::domain::venue::{Venue, VenueAvailability, VenueMarket};
use crate::error::EngineResult;
use crate::ports::store::CatalogStore;

pub struct VenueCatalog {
    store: Arc<dyn CatalogStore>,
}

impl VenueCatalog {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn market(&self, venue: Venue, token_symbol: &str) -> EngineResult<Option<VenueMarket>> {
        Ok(self.store.market(venue, token_symbol).await?)
    }

    /// Availability of (venue, token) for a specific deployment. Reasons are
    /// recorded verbatim in the routing audit trail.
    pub async fn availability(
        &self,
        deployment: &Deployment,
        venue: Venue,
        token_symbol: &str,
    ) -> EngineResult<VenueAvailability> {
        let market = match self.store.market(venue, token_symbol).await? {
            Some(m) => m,
            None => {
                return Ok(VenueAvailability::unavailable(
                    venue,
                    format!("{token_symbol} not listed on {venue}"),
                ))
            }
        };
        if !market.is_active {
            return Ok(VenueAvailability::unavailable(
                venue,
                format!("{token_symbol} market inactive on {venue}"),
            ));
        }
        if !deployment.credentials_for(venue) {
            let reason = if venue.uses_wallet_module() {
                format!("execution module disabled for wallet {}", deployment.user_wallet)
            } else {
                format!("no delegated agent for {venue}")
            };
            return Ok(VenueAvailability::unavailable(venue, reason));
        }
        Ok(VenueAvailability::available(
            venue,
            format!("{token_symbol} active on {venue}"),
        ))
    }

    pub async fn list_markets(&self) -> EngineResult<Vec<VenueMarket>> {
        Ok(self.store.list_markets().await?)
    }
}
