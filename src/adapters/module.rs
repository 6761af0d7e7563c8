//! Delegated module adapter (spot execution)
//!
//! Spot trades execute on-chain through a delegated execution module attached
//! to the user's smart wallet. The module-executor service builds, signs and
//! lands the transaction; this adapter derives the actual fill from the
//! receipt's ERC-20 Transfer logs rather than trusting the requested size,
//! and surfaces decoded revert reasons as deterministic failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapters::venue_http::VenueServiceConfig;
use crate::domain::position::Fill;
use crate::domain::signal::Side;
use crate::domain::venue::Venue;
use crate::ports::venue::{AdapterError, CloseOrder, OpenOrder, VenueAdapter};

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str = "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleExecuteRequest<'a> {
    user_wallet: &'a str,
    token_address: &'a str,
    action: &'a str,
    collateral_usd: f64,
    min_amount_out: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    qty: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptLog {
    address: String,
    topics: Vec<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleExecuteResponse {
    tx_hash: String,
    status: String,
    #[serde(default)]
    revert_reason: Option<String>,
    #[serde(default)]
    logs: Vec<ReceiptLog>,
    token_decimals: u8,
    execution_price_usd: f64,
    #[serde(default)]
    gas_fee_usd: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleBalanceResponse {
    balance_usd: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleHoldingResponse {
    qty: f64,
}

pub struct DelegatedModuleAdapter {
    config: VenueServiceConfig,
    http: reqwest::Client,
}

impl DelegatedModuleAdapter {
    pub fn new(config: VenueServiceConfig) -> Result<Self, AdapterError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Transport(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    async fn execute(
        &self,
        wallet: &str,
        token_address: &str,
        action: &str,
        collateral_usd: f64,
        min_amount_out: f64,
        qty: Option<f64>,
    ) -> Result<ModuleExecuteResponse, AdapterError> {
        let body = ModuleExecuteRequest {
            user_wallet: wallet,
            token_address,
            action,
            collateral_usd,
            min_amount_out,
            qty,
        };
        let mut req = self
            .http
            .post(format!("{}/module/execute", self.config.base_url))
            .json(&body);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                AdapterError::Transport(format!("{status}: {text}"))
            } else {
                AdapterError::Rejected(format!("{status}: {text}"))
            });
        }

        let parsed: ModuleExecuteResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Transport(format!("response parse: {e}")))?;

        if parsed.status != "success" {
            let reason = parsed
                .revert_reason
                .unwrap_or_else(|| "unknown revert".to_string());
            let lower = reason.to_ascii_lowercase();
            return Err(if lower.contains("insufficient") {
                AdapterError::InsufficientFunds(reason)
            } else {
                AdapterError::Reverted(reason)
            });
        }
        Ok(parsed)
    }

    fn fill_from_receipt(
        response: &ModuleExecuteResponse,
        token_address: &str,
        wallet: &str,
        incoming: bool,
    ) -> Result<Fill, AdapterError> {
        let raw = transfer_amount(&response.logs, token_address, wallet, incoming)
            .ok_or_else(|| {
                AdapterError::Transport(format!(
                    "no Transfer log for {token_address} in tx {}",
                    response.tx_hash
                ))
            })?;
        let qty = scale_amount(raw, response.token_decimals);
        if qty <= 0.0 {
            return Err(AdapterError::Transport(format!(
                "zero fill quantity in tx {}",
                response.tx_hash
            )));
        }
        Ok(Fill::new(qty, response.execution_price_usd, &response.tx_hash)
            .with_fees(response.gas_fee_usd))
    }
}

/// Sum of ERC-20 Transfer amounts on `token_address` where the wallet is the
/// recipient (`incoming`) or the sender. Amounts are raw token units.
fn transfer_amount(
    logs: &[ReceiptLog],
    token_address: &str,
    wallet: &str,
    incoming: bool,
) -> Option<u128> {
    let wallet = strip_0x(wallet).to_ascii_lowercase();
    let token = strip_0x(token_address).to_ascii_lowercase();
    let mut total: u128 = 0;
    let mut matched = false;

    for log in logs {
        if strip_0x(&log.address).to_ascii_lowercase() != token || log.topics.len() < 3 {
            continue;
        }
        if strip_0x(&log.topics[0]).to_ascii_lowercase() != TRANSFER_TOPIC {
            continue;
        }
        // topics[1] = from, topics[2] = to; addresses are right-aligned in
        // 32-byte topics.
        let counterparty = if incoming { &log.topics[2] } else { &log.topics[1] };
        if !strip_0x(counterparty)
            .to_ascii_lowercase()
            .ends_with(&wallet)
        {
            continue;
        }
        match parse_hex_amount(&log.data) {
            Some(amount) => {
                total = total.saturating_add(amount);
                matched = true;
            }
            None => warn!(data = %log.data, "Unparseable Transfer amount"),
        }
    }

    matched.then_some(total)
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn parse_hex_amount(data: &str) -> Option<u128> {
    let bytes = hex::decode(strip_0x(data)).ok()?;
    // Reject values beyond u128; no real token transfer gets close.
    if bytes.len() > 16 && bytes[..bytes.len() - 16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut value: u128 = 0;
    for b in bytes.iter().skip(bytes.len().saturating_sub(16)) {
        value = (value << 8) | *b as u128;
    }
    Some(value)
}

fn scale_amount(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

#[async_trait]
impl VenueAdapter for DelegatedModuleAdapter {
    fn venue(&self) -> Venue {
        Venue::Spot
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        match self.http.get(url).send().await {
            Ok(r) => r.status().is_success(),
            Err(_) => false,
        }
    }

    async fn balance_usd(&self, wallet: &str) -> Result<f64, AdapterError> {
        let response = self
            .http
            .get(format!("{}/module/balance", self.config.base_url))
            .query(&[("wallet", wallet)])
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let parsed: ModuleBalanceResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Transport(format!("response parse: {e}")))?;
        Ok(parsed.balance_usd)
    }

    async fn submit_open(&self, order: &OpenOrder) -> Result<Fill, AdapterError> {
        if order.side == Side::Short {
            return Err(AdapterError::Rejected(
                "spot module cannot open short positions".into(),
            ));
        }
        let token_address = order.token_address.as_deref().ok_or_else(|| {
            AdapterError::Rejected("spot orders require an on-chain token address".into())
        })?;
        let expected_out = order.collateral_usd; // refined by the service quote
        let response = self
            .execute(
                &order.wallet,
                token_address,
                "buy",
                order.collateral_usd,
                order.min_amount_out(expected_out),
                None,
            )
            .await?;
        let fill = Self::fill_from_receipt(&response, token_address, &order.wallet, true)?;
        debug!(tx = %fill.tx_ref, qty = fill.qty, "Module buy confirmed");
        Ok(fill)
    }

    async fn submit_close(&self, order: &CloseOrder) -> Result<Fill, AdapterError> {
        let token_address = order.token_address.as_deref().ok_or_else(|| {
            AdapterError::Rejected("spot orders require an on-chain token address".into())
        })?;
        let response = self
            .execute(&order.wallet, token_address, "sell", 0.0, 0.0, Some(order.qty))
            .await?;
        let fill = Self::fill_from_receipt(&response, token_address, &order.wallet, false)?;
        debug!(tx = %fill.tx_ref, qty = fill.qty, "Module sell confirmed");
        Ok(fill)
    }

    async fn position_open(
        &self,
        wallet: &str,
        token_symbol: &str,
    ) -> Result<bool, AdapterError> {
        let response = self
            .http
            .get(format!("{}/module/holding", self.config.base_url))
            .query(&[("wallet", wallet), ("token", token_symbol)])
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let parsed: ModuleHoldingResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Transport(format!("response parse: {e}")))?;
        Ok(parsed.qty > 0.0)
    }
}
