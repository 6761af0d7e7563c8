//! Price oracle adapter
//!
//! Reference prices come from a price aggregation service keyed by token
//! symbol. Exit evaluation tolerates a stale tick, so failures surface as
//! `Unavailable` and the monitor skips the position until the next pass.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::adapters::venue_http::VenueServiceConfig;
use crate::ports::price::{PriceFeed, PriceFeedError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceResponse {
    price_usd: f64,
}

pub struct OraclePriceFeed {
    config: VenueServiceConfig,
    http: Client,
}

impl OraclePriceFeed {
    pub fn new(config: VenueServiceConfig) -> Result<Self, PriceFeedError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PriceFeedError::Feed(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl PriceFeed for OraclePriceFeed {
    async fn latest_price(&self, token_symbol: &str) -> Result<f64, PriceFeedError> {
        let response = self
            .http
            .get(format!("{}/price", self.config.base_url))
            .query(&[("symbol", token_symbol)])
            .send()
            .await
            .map_err(|e| PriceFeedError::Feed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceFeedError::Unavailable(token_symbol.to_string()));
        }

        let parsed: PriceResponse = response
            .json()
            .await
            .map_err(|e| PriceFeedError::Feed(format!("response parse: {e}")))?;

        if !parsed.price_usd.is_finite() || parsed.price_usd <= 0.0 {
            return Err(PriceFeedError::Unavailable(token_symbol.to_string()));
        }
        Ok(parsed.price_usd)
    }
}
