//! Coinbase Exchange REST price source (spot)
//!
//! - `GET /products` lists tradable products
//! - `GET /products/{id}/ticker` returns the last trade price

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::adapters::errors::{VenueError, VenueResult};
use crate::adapters::http::{build_client, parse_price};
use crate::adapters::traits::PriceSource;

/// Production REST endpoint
pub const COINBASE_BASE_URL: &str = "https://api.exchange.coinbase.com";

/// Coinbase source configuration
#[derive(Debug, Clone)]
pub struct CoinbaseConfig {
    /// REST base URL without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for CoinbaseConfig {
    fn default() -> Self {
        Self {
            base_url: COINBASE_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoinbaseProduct {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    trading_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct CoinbaseTicker {
    #[serde(default)]
    price: String,
}

/// Coinbase price source implementing `PriceSource`
pub struct CoinbaseSource {
    config: CoinbaseConfig,
    http_client: reqwest::Client,
}

impl CoinbaseSource {
    pub fn new(config: CoinbaseConfig) -> Self {
        let http_client = build_client(config.request_timeout);
        Self { config, http_client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str) -> VenueResult<reqwest::Response> {
        self.http_client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| VenueError::from_request(e, self.config.request_timeout))
    }
}

#[async_trait]
impl PriceSource for CoinbaseSource {
    async fn list_symbols(&self) -> VenueResult<Vec<String>> {
        let response = self.get("/products").await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VenueError::VenueUnavailable(format!("Coinbase HTTP {}", status)));
        }

        let products: Vec<CoinbaseProduct> = response
            .json()
            .await
            .map_err(|e| VenueError::from_request(e, self.config.request_timeout))?;

        let symbols: Vec<String> = products
            .into_iter()
            .filter(|p| p.status == "online" && !p.trading_disabled)
            .map(|p| p.id)
            .collect();
        debug!(venue = "coinbase", count = symbols.len(), "Fetched product listing");
        Ok(symbols)
    }

    async fn last_price(&self, native_symbol: &str) -> VenueResult<Decimal> {
        let response = self
            .get(&format!("/products/{}/ticker", native_symbol))
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(VenueError::VenueUnavailable(format!("Coinbase HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(VenueError::SymbolUnavailable {
                symbol: native_symbol.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let ticker: CoinbaseTicker = response
            .json()
            .await
            .map_err(|e| VenueError::from_request(e, self.config.request_timeout))?;
        let price = parse_price(native_symbol, &ticker.price)?;
        debug!(venue = "coinbase", symbol = native_symbol, price = %price, "Fetched last price");
        Ok(price)
    }

    fn venue_name(&self) -> &str {
        "coinbase"
    }
}
