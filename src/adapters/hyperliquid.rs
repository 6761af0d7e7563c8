//! Hyperliquid venue adapter
//!
//! Delegated-agent execution through the Hyperliquid execution service.
//! Orders are signed server-side by the per-deployment agent wallet, so the
//! adapter requires `agent` to be set on every order it submits.

use async_trait::async_trait;

use crate::adapters::venue_http::{VenueServiceClient, VenueServiceConfig};
use crate::domain::position::Fill;
use crate::domain::venue::Venue;
use crate::ports::venue::{AdapterError, CloseOrder, OpenOrder, VenueAdapter};

pub struct HyperliquidAdapter {
    client: VenueServiceClient,
}

impl HyperliquidAdapter {
    pub fn new(config: VenueServiceConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            client: VenueServiceClient::new(config)?,
        })
    }

    fn require_agent(agent: Option<&str>) -> Result<(), AdapterError> {
        if agent.is_none() {
            return Err(AdapterError::Rejected(
                "hyperliquid orders require a delegated agent credential".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VenueAdapter for HyperliquidAdapter {
    fn venue(&self) -> Venue {
        Venue::Hyperliquid
    }

    async fn health(&self) -> bool {
        self.client.health().await
    }

    async fn balance_usd(&self, wallet: &str) -> Result<f64, AdapterError> {
        self.client.balance_usd(wallet).await
    }

    async fn submit_open(&self, order: &OpenOrder) -> Result<Fill, AdapterError> {
        Self::require_agent(order.agent.as_deref())?;
        self.client.execute_trade(order).await
    }

    async fn submit_close(&self, order: &CloseOrder) -> Result<Fill, AdapterError> {
        Self::require_agent(order.agent.as_deref())?;
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
