//! Ostium venue adapter
//!
//! Synthetic-asset perps (FX, commodities, large caps) through the Ostium
//! execution service. Same wire contract as Hyperliquid; Ostium additionally
//! trades markets whose symbols are not crypto tokens, which is why the
//! catalog, not the adapter, decides what is listed.

use async_trait::async_trait;

use crate::adapters::venue_http::{VenueServiceClient, VenueServiceConfig};
use crate::domain::position::Fill;
use crate::domain::venue::Venue;
use crate::ports::venue::{AdapterError, CloseOrder, OpenOrder, VenueAdapter};

pub struct OstiumAdapter {
    client: VenueServiceClient,
}

impl OstiumAdapter {
    pub fn new(config: VenueServiceConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            client: VenueServiceClient::new(config)?,
        })
    }
}

#[async_trait]
impl VenueAdapter for OstiumAdapter {
    fn venue(&self) -> Venue {
        Venue::Ostium
    }

    async fn health(&self) -> bool {
        self.client.health().await
    }

    async fn balance_usd(&self, wallet: &str) -> Result<f64, AdapterError> {
        self.client.balance_usd(wallet).await
    }

    async fn submit_open(&self, order: &OpenOrder) -> Result<Fill, AdapterError> {
        self.client.execute_trade(order).await
    }

    async fn submit_close(&self, order: &CloseOrder) -> Result<Fill, AdapterError> {
        self.client.close_position(order).await
    }

    async fn position_open(
        &self,
        wallet: &str,
        token_symbol: &str,
    ) -> Result<bool, AdapterError> {
        self.client.position_open(wallet, token_symbol).await
    }
}
