//! Price source factory
//!
//! Creates `PriceSource` instances from venue configuration.
//! Uses an enum-based dispatch pattern (no `Box<dyn>`) to preserve monomorphization.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::bybit::{BybitConfig, BybitSource};
use crate::adapters::coinbase::{CoinbaseConfig, CoinbaseSource};
use crate::adapters::errors::VenueResult;
use crate::adapters::traits::PriceSource;
use crate::config::{VenueConfig, VenueKind};

/// Enum wrapping all concrete sources for runtime dispatch
pub enum AnyPriceSource {
    Bybit(BybitSource),
    Coinbase(CoinbaseSource),
}

macro_rules! delegate {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyPriceSource::Bybit(s) => s.$method($($arg),*),
            AnyPriceSource::Coinbase(s) => s.$method($($arg),*),
        }
    };
    (await $self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyPriceSource::Bybit(s) => s.$method($($arg),*).await,
            AnyPriceSource::Coinbase(s) => s.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl PriceSource for AnyPriceSource {
    async fn list_symbols(&self) -> VenueResult<Vec<String>> {
        delegate!(await self, list_symbols())
    }

    async fn last_price(&self, native_symbol: &str) -> VenueResult<Decimal> {
        delegate!(await self, last_price(native_symbol))
    }

    fn venue_name(&self) -> &str {
        delegate!(self, venue_name())
    }
}

/// Create a source for a configured venue
///
/// `base_url` overrides the production endpoint when set.
pub fn create_source(venue: &VenueConfig, request_timeout: Duration) -> AnyPriceSource {
    match venue.kind {
        VenueKind::Bybit => {
            let mut config = BybitConfig {
                request_timeout,
                ..BybitConfig::default()
            };
            if let Some(url) = &venue.base_url {
                config.base_url = url.trim_end_matches('/').to_string();
            }
            AnyPriceSource::Bybit(BybitSource::new(config))
        }
        VenueKind::Coinbase => {
            let mut config = CoinbaseConfig {
                request_timeout,
                ..CoinbaseConfig::default()
            };
            if let Some(url) = &venue.base_url {
                config.base_url = url.trim_end_matches('/').to_string();
            }
            AnyPriceSource::Coinbase(CoinbaseSource::new(config))
        }
    }
}
