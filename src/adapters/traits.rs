//! Price source trait definition
//!
//! The PriceSource trait is the only capability the monitoring core needs
//! from a venue: list what is quoted, and return the last trade price.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::errors::VenueResult;

/// Common trait for all venue price sources
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
///
/// struct StaticSource;
///
/// #[async_trait]
/// impl PriceSource for StaticSource {
///     async fn list_symbols(&self) -> VenueResult<Vec<String>> {
///         Ok(vec!["BTC-USD".to_string()])
///     }
///     async fn last_price(&self, _symbol: &str) -> VenueResult<Decimal> {
///         Ok(Decimal::new(4200000, 2))
///     }
///     fn venue_name(&self) -> &str { "static" }
/// }
/// ```
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// List native symbols currently quoted on the venue
    ///
    /// Fails with `VenueError::VenueUnavailable` when the venue cannot be reached.
    async fn list_symbols(&self) -> VenueResult<Vec<String>>;

    /// Last trade price for a native symbol
    ///
    /// # Arguments
    /// * `native_symbol` - Venue spelling (e.g., "BTCUSDT" on Bybit, "BTC-USD" on Coinbase)
    async fn last_price(&self, native_symbol: &str) -> VenueResult<Decimal>;

    /// Venue identifier used in logs
    fn venue_name(&self) -> &str;
}

#[async_trait]
impl<T: PriceSource + ?Sized> PriceSource for std::sync::Arc<T> {
    async fn list_symbols(&self) -> VenueResult<Vec<String>> {
        (**self).list_symbols().await
    }

    async fn last_price(&self, native_symbol: &str) -> VenueResult<Decimal> {
        (**self).last_price(native_symbol).await
    }

    fn venue_name(&self) -> &str {
        (**self).venue_name()
    }
}
