//! Bybit REST price source (linear perpetuals)
//!
//! Uses the public v5 market endpoint:
//! - `GET /v5/market/tickers?category=linear` for the symbol listing
//! - `GET /v5/market/tickers?category=linear&symbol=BTCUSDT` for the last price
//!
//! No authentication is required for market data.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::adapters::errors::{VenueError, VenueResult};
use crate::adapters::http::{build_client, parse_price};
use crate::adapters::traits::PriceSource;

/// Production REST endpoint
pub const BYBIT_BASE_URL: &str = "https://api.bybit.com";

/// Bybit source configuration
#[derive(Debug, Clone)]
pub struct BybitConfig {
    /// REST base URL without trailing slash
    pub base_url: String,
    /// Product category ("linear" for USDT/USDC perpetuals)
    pub category: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            base_url: BYBIT_BASE_URL.to_string(),
            category: "linear".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<BybitTickerList>,
}

#[derive(Debug, Deserialize)]
struct BybitTickerList {
    #[serde(default)]
    list: Vec<BybitTicker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTicker {
    symbol: String,
    #[serde(default)]
    last_price: String,
}

// =============================================================================
// Source
// =============================================================================

/// Bybit price source implementing `PriceSource`
pub struct BybitSource {
    config: BybitConfig,
    http_client: reqwest::Client,
}

impl BybitSource {
    pub fn new(config: BybitConfig) -> Self {
        let http_client = build_client(config.request_timeout);
        Self { config, http_client }
    }

    fn tickers_url(&self) -> String {
        format!("{}/v5/market/tickers", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch_tickers(&self, symbol: Option<&str>) -> VenueResult<Vec<BybitTicker>> {
        let mut query = vec![("category", self.config.category.as_str())];
        if let Some(symbol) = symbol {
            query.push(("symbol", symbol));
        }

        let response = self
            .http_client
            .get(self.tickers_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| VenueError::from_request(e, self.config.request_timeout))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::FORBIDDEN {
            return Err(VenueError::VenueUnavailable(format!("Bybit HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(VenueError::InvalidResponse(format!("Bybit HTTP {}", status)));
        }

        let envelope: BybitEnvelope = response
            .json()
            .await
            .map_err(|e| VenueError::from_request(e, self.config.request_timeout))?;

        if envelope.ret_code != 0 {
            let reason = format!("retCode {}: {}", envelope.ret_code, envelope.ret_msg);
            return Err(match symbol {
                Some(symbol) => VenueError::SymbolUnavailable {
                    symbol: symbol.to_string(),
                    reason,
                },
                None => VenueError::VenueUnavailable(reason),
            });
        }

        Ok(envelope.result.map(|r| r.list).unwrap_or_default())
    }
}

#[async_trait]
impl PriceSource for BybitSource {
    async fn list_symbols(&self) -> VenueResult<Vec<String>> {
        let tickers = self.fetch_tickers(None).await?;
        debug!(venue = "bybit", count = tickers.len(), "Fetched ticker listing");
        Ok(tickers.into_iter().map(|t| t.symbol).collect())
    }

    async fn last_price(&self, native_symbol: &str) -> VenueResult<Decimal> {
        let tickers = self.fetch_tickers(Some(native_symbol)).await?;
        let ticker = tickers
            .into_iter()
            .find(|t| t.symbol == native_symbol)
            .ok_or_else(|| VenueError::SymbolUnavailable {
                symbol: native_symbol.to_string(),
                reason: "missing from ticker response".to_string(),
            })?;
        let price = parse_price(native_symbol, &ticker.last_price)?;
        debug!(venue = "bybit", symbol = native_symbol, price = %price, "Fetched last price");
        Ok(price)
    }

    fn venue_name(&self) -> &str {
        "bybit"
    }
}
