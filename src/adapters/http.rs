//! Shared helpers for the REST price sources

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::adapters::errors::{VenueError, VenueResult};

/// User agent sent to every venue (Coinbase rejects requests without one)
pub const USER_AGENT: &str = concat!("spread_watch/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client whose requests are bounded by `timeout`
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Parse a decimal price string as returned by venue APIs
pub fn parse_price(symbol: &str, raw: &str) -> VenueResult<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VenueError::SymbolUnavailable {
            symbol: symbol.to_string(),
            reason: "empty last price".to_string(),
        });
    }
    Decimal::from_str(trimmed).map_err(|e| {
        VenueError::InvalidResponse(format!("Unparseable price '{}' for {}: {}", raw, symbol, e))
    })
}
