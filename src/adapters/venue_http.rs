//! Venue service HTTP client
//!
//! Both API-executed venues (Hyperliquid, Ostium) are fronted by a small
//! execution service exposing the same endpoints:
//!
//!   POST /execute-trade    open a position, returns the confirmed fill
//!   POST /close-position   close a position, returns the confirmed fill
//!   GET  /positions        open state for (wallet, token)
//!   GET  /balance          funding-asset balance in USD
//!   GET  /health           reachability probe
//!
//! This client owns the wire format and the mapping from HTTP outcomes to
//! [`AdapterError`]. The per-venue adapters are thin wrappers over it.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::position::Fill;
use crate::ports::venue::{AdapterError, CloseOrder, OpenOrder};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct VenueServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl VenueServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteTradeRequest<'a> {
    wallet: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<&'a str>,
    token_symbol: &'a str,
    side: &'a str,
    collateral_usd: f64,
    leverage: f64,
    slippage_bps: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClosePositionRequest<'a> {
    wallet: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<&'a str>,
    token_symbol: &'a str,
    side: &'a str,
    qty: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillResponse {
    qty: f64,
    price: f64,
    tx_ref: String,
    #[serde(default)]
    fees_usd: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionStatusResponse {
    open: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    balance_usd: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for one venue execution service.
#[derive(Debug, Clone)]
pub struct VenueServiceClient {
    config: VenueServiceConfig,
    http: Client,
}

impl VenueServiceClient {
    pub fn new(config: VenueServiceConfig) -> Result<Self, AdapterError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Transport(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub async fn execute_trade(&self, order: &OpenOrder) -> Result<Fill, AdapterError> {
        let body = ExecuteTradeRequest {
            wallet: &order.wallet,
            agent: order.agent.as_deref(),
            token_symbol: &order.token_symbol,
            side: side_str(order.side),
            collateral_usd: order.collateral_usd,
            leverage: order.leverage,
            slippage_bps: order.slippage_bps,
        };
        debug!(token = %order.token_symbol, collateral_usd = order.collateral_usd, "Submitting open");
        let response = self.post("/execute-trade", &body).await?;
        let fill: FillResponse = Self::handle_response(response).await?;
        Ok(Fill::new(fill.qty, fill.price, &fill.tx_ref).with_fees(fill.fees_usd))
    }

    pub async fn close_position(&self, order: &CloseOrder) -> Result<Fill, AdapterError> {
        let body = ClosePositionRequest {
            wallet: &order.wallet,
            agent: order.agent.as_deref(),
            token_symbol: &order.token_symbol,
            side: side_str(order.side),
            qty: order.qty,
        };
        debug!(token = %order.token_symbol, qty = order.qty, "Submitting close");
        let response = self.post("/close-position", &body).await?;
        let fill: FillResponse = Self::handle_response(response).await?;
        Ok(Fill::new(fill.qty, fill.price, &fill.tx_ref).with_fees(fill.fees_usd))
    }

    pub async fn position_open(
        &self,
        wallet: &str,
        token_symbol: &str,
    ) -> Result<bool, AdapterError> {
        let response = self
            .get("/positions", &[("wallet", wallet), ("token", token_symbol)])
            .await?;
        let status: PositionStatusResponse = Self::handle_response(response).await?;
        Ok(status.open)
    }

    pub async fn balance_usd(&self, wallet: &str) -> Result<f64, AdapterError> {
        let response = self.get("/balance", &[("wallet", wallet)]).await?;
        let balance: BalanceResponse = Self::handle_response(response).await?;
        Ok(balance.balance_usd)
    }

    pub async fn health(&self) -> bool {
        match self.get("/health", &[]).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(base_url = %self.config.base_url, error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, AdapterError> {
        let mut req = self
            .http
            .post(format!("{}{path}", self.config.base_url))
            .json(body);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }
        req.send().await.map_err(map_reqwest_error)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, AdapterError> {
        let mut req = self
            .http
            .get(format!("{}{path}", self.config.base_url))
            .query(query);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }
        req.send().await.map_err(map_reqwest_error)
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AdapterError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AdapterError::Transport(format!("response parse: {e}")));
        }

        let error_text = response
            .text()
            .await
            .ok()
            .and_then(|t| {
                serde_json::from_str::<ErrorResponse>(&t)
                    .map(|e| e.error)
                    .ok()
                    .or(Some(t))
            })
            .unwrap_or_default();

        Err(classify_service_error(status, &error_text))
    }
}

fn side_str(side: crate::domain::signal::Side) -> &'static str {
    match side {
        crate::domain::signal::Side::Long => "LONG",
        crate::domain::signal::Side::Short => "SHORT",
    }
}

fn map_reqwest_error(err: reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Timeout
    } else {
        AdapterError::Transport(err.to_string())
    }
}

/// Map an error response from the execution service onto the adapter
/// taxonomy. Server errors are transient transport problems; 4xx bodies
/// carry a deterministic reason.
fn classify_service_error(status: StatusCode, error_text: &str) -> AdapterError {
    if status == StatusCode::GATEWAY_TIMEOUT || status == StatusCode::REQUEST_TIMEOUT {
        return AdapterError::Timeout;
    }
    if status.is_server_error() {
        return AdapterError::Transport(format!("{status}: {error_text}"));
    }

    let lower = error_text.to_ascii_lowercase();
    if lower.contains("insufficient") {
        AdapterError::InsufficientFunds(error_text.to_string())
    } else if lower.contains("no position") || lower.contains("position not found") {
        AdapterError::PositionNotFound
    } else if lower.contains("revert") {
        AdapterError::Reverted(error_text.to_string())
    } else {
        AdapterError::Rejected(format!("{status}: {error_text}"))
    }
}
