//! Hand-rolled recording mocks for the port traits
//!
//! Used by unit and integration tests to script adapter behavior and assert
//! on exactly what the engine submitted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::position::Fill;
use crate::domain::venue::Venue;
use crate::ports::price::{PriceFeed, PriceFeedError};
use crate::ports::venue::{AdapterError, CloseOrder, OpenOrder, VenueAdapter};

/// Scripted venue adapter that records every call.
pub struct MockVenueAdapter {
    venue: Venue,
    balances: Mutex<HashMap<String, f64>>,
    open_results: Mutex<VecDeque<Result<Fill, AdapterError>>>,
    close_results: Mutex<VecDeque<Result<Fill, AdapterError>>>,
    position_open: Mutex<bool>,
    pub open_calls: Arc<Mutex<Vec<OpenOrder>>>,
    pub close_calls: Arc<Mutex<Vec<CloseOrder>>>,
}

impl MockVenueAdapter {
    pub fn new(venue: Venue) -> Self {
        Self {
            venue,
            balances: Mutex::new(HashMap::new()),
            open_results: Mutex::new(VecDeque::new()),
            close_results: Mutex::new(VecDeque::new()),
            position_open: Mutex::new(true),
            open_calls: Arc::new(Mutex::new(Vec::new())),
            close_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_balance(self, wallet: &str, balance_usd: f64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(wallet.to_string(), balance_usd);
        self
    }

    pub fn with_open_result(self, result: Result<Fill, AdapterError>) -> Self {
        self.open_results.lock().unwrap().push_back(result);
        self
    }

    pub fn with_close_result(self, result: Result<Fill, AdapterError>) -> Self {
        self.close_results.lock().unwrap().push_back(result);
        self
    }

    pub fn with_position_open(self, open: bool) -> Self {
        *self.position_open.lock().unwrap() = open;
        self
    }

    pub fn set_position_open(&self, open: bool) {
        *self.position_open.lock().unwrap() = open;
    }

    pub fn push_close_result(&self, result: Result<Fill, AdapterError>) {
        self.close_results.lock().unwrap().push_back(result);
    }

    pub fn open_call_count(&self) -> usize {
        self.open_calls.lock().unwrap().len()
    }

    pub fn close_call_count(&self) -> usize {
        self.close_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VenueAdapter for MockVenueAdapter {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn health(&self) -> bool {
        true
    }

    async fn balance_usd(&self, wallet: &str) -> Result<f64, AdapterError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(wallet)
            .copied()
            .unwrap_or(0.0))
    }

    async fn submit_open(&self, order: &OpenOrder) -> Result<Fill, AdapterError> {
        self.open_calls.lock().unwrap().push(order.clone());
        self.open_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::Rejected("no scripted open result".into())))
    }

    async fn submit_close(&self, order: &CloseOrder) -> Result<Fill, AdapterError> {
        self.close_calls.lock().unwrap().push(order.clone());
        self.close_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::Rejected("no scripted close result".into())))
    }

    async fn position_open(&self, _wallet: &str, _token: &str) -> Result<bool, AdapterError> {
        Ok(*self.position_open.lock().unwrap())
    }
}

/// Price feed that replays a scripted price sequence per token, repeating the
/// last price once the sequence is exhausted.
#[derive(Default)]
pub struct MockPriceFeed {
    sequences: Mutex<HashMap<String, VecDeque<f64>>>,
    last: Mutex<HashMap<String, f64>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(self, token: &str, prices: &[f64]) -> Self {
        self.sequences
            .lock()
            .unwrap()
            .insert(token.to_string(), prices.iter().copied().collect());
        self
    }

    pub fn set_price(&self, token: &str, price: f64) {
        self.last.lock().unwrap().insert(token.to_string(), price);
        self.sequences.lock().unwrap().remove(token);
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn latest_price(&self, token_symbol: &str) -> Result<f64, PriceFeedError> {
        self.calls.lock().unwrap().push(token_symbol.to_string());
        let mut sequences = self.sequences.lock().unwrap();
        if let Some(seq) = sequences.get_mut(token_symbol) {
            if let Some(price) = seq.pop_front() {
                self.last
                    .lock()
                    .unwrap()
                    .insert(token_symbol.to_string(), price);
                return Ok(price);
            }
        }
        self.last
            .lock()
            .unwrap()
            .get(token_symbol)
            .copied()
            .ok_or_else(|| PriceFeedError::Unavailable(token_symbol.to_string()))
    }
}
