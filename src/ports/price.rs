//! Price feed seam
//!
//! Pull interface for the latest reference price of a token. Whether that is
//! an on-chain oracle, a venue mid-price or an external aggregator is an
//! adapter detail.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("Price unavailable for {0}")]
    Unavailable(String),
    #[error("Feed error: {0}")]
    Feed(String),
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Latest reference price in USD.
    async fn latest_price(&self, token_symbol: &str) -> Result<f64, PriceFeedError>;
}
