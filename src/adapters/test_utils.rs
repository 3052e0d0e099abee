//! Shared test utilities for price source testing
//!
//! Provides a configurable `MockPriceSource` used by the core module tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::errors::{VenueError, VenueResult};
use crate::adapters::traits::PriceSource;

/// In-memory price source with switchable failures
pub struct MockPriceSource {
    /// Venue name returned by `venue_name()`
    pub name: &'static str,
    /// Native symbol -> last price
    prices: Mutex<HashMap<String, Decimal>>,
    /// Symbols whose lookup fails with `SymbolUnavailable`
    failing: Mutex<HashSet<String>>,
    /// When true, `list_symbols` fails with `VenueUnavailable`
    listing_down: Mutex<bool>,
    /// When true, `list_symbols` panics
    panic_on_list: AtomicBool,
    /// Artificial latency applied to `last_price`
    delay: Option<Duration>,
    /// Number of `last_price` calls
    pub price_calls: Arc<AtomicUsize>,
    /// Number of `list_symbols` calls
    pub list_calls: Arc<AtomicUsize>,
}

impl MockPriceSource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            prices: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            listing_down: Mutex::new(false),
            panic_on_list: AtomicBool::new(false),
            delay: None,
            price_calls: Arc::new(AtomicUsize::new(0)),
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        let price = Decimal::from_f64_retain(price).unwrap_or_default();
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    pub fn restore_symbol(&self, symbol: &str) {
        self.failing.lock().unwrap().remove(symbol);
    }

    pub fn set_listing_down(&self, down: bool) {
        *self.listing_down.lock().unwrap() = down;
    }

    pub fn set_panic_on_list(&self, panic: bool) {
        self.panic_on_list.store(panic, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn list_symbols(&self) -> VenueResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_list.load(Ordering::SeqCst) {
            panic!("{} listing exploded", self.name);
        }
        if *self.listing_down.lock().unwrap() {
            return Err(VenueError::VenueUnavailable(format!("{} is down", self.name)));
        }
        let mut symbols: Vec<String> = self.prices.lock().unwrap().keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    async fn last_price(&self, native_symbol: &str) -> VenueResult<Decimal> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(native_symbol) {
            return Err(VenueError::SymbolUnavailable {
                symbol: native_symbol.to_string(),
                reason: "mock failure".to_string(),
            });
        }
        self.prices
            .lock()
            .unwrap()
            .get(native_symbol)
            .copied()
            .ok_or_else(|| VenueError::SymbolUnavailable {
                symbol: native_symbol.to_string(),
                reason: "not listed".to_string(),
            })
    }

    fn venue_name(&self) -> &str {
        self.name
    }
}
