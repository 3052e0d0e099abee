//! Venue price sources for Bybit and Coinbase
//!
//! This module provides the `PriceSource` abstraction the monitoring core
//! depends on, plus REST implementations for each supported venue.

pub mod bybit;
pub mod coinbase;
pub mod errors;
pub mod factory;
pub mod http;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use bybit::{BybitConfig, BybitSource};
pub use coinbase::{CoinbaseConfig, CoinbaseSource};
pub use errors::{VenueError, VenueResult};
pub use factory::{create_source, AnyPriceSource};
pub use traits::PriceSource;
