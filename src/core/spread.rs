//! Spread calculation between two venues
//!
//! For every common symbol the last trade price is fetched from both venues
//! and turned into a percentage deviation from the reference venue:
//!
//! ```text
//! spread_pct = (price_other - price_reference) / price_reference * 100
//! ```
//!
//! # Architecture
//! - `spread_pct`: pure formula with zero/negative guards
//! - `RateCalculator`: bounded-concurrency fetch of one full `RateSnapshot`
//! - `RateSnapshot`: symbol -> spread for one cycle, never partial

use std::collections::HashMap;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use crate::adapters::{PriceSource, VenueError, VenueResult};
use crate::config::ReferenceVenue;
use crate::core::symbols::{CommonSymbols, Symbol, SymbolPair};

// =============================================================================
// Formula
// =============================================================================

/// Percentage deviation of `other` from `reference`
///
/// Returns `None` when either price is zero or negative, or when the result
/// is not a finite `f64`.
#[inline]
#[must_use]
pub fn spread_pct(reference: Decimal, other: Decimal) -> Option<f64> {
    if reference <= Decimal::ZERO || other <= Decimal::ZERO {
        return None;
    }
    let ratio = other.checked_sub(reference)?.checked_div(reference)?;
    let pct = ratio.checked_mul(Decimal::ONE_HUNDRED)?.to_f64()?;
    pct.is_finite().then_some(pct)
}

/// Reject prices that cannot be used in the spread formula
pub fn validate_reading(symbol: &str, price: Decimal) -> VenueResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(VenueError::InvalidReading {
            symbol: symbol.to_string(),
            price: price.to_string(),
        });
    }
    Ok(price)
}

// =============================================================================
// RateSnapshot
// =============================================================================

/// Spread per symbol for one poll cycle
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RateSnapshot {
    rates: HashMap<Symbol, f64>,
    /// Common symbols left out this cycle (fetch failure or invalid reading)
    pub omitted: usize,
}

impl RateSnapshot {
    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.rates.get(symbol).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.rates.iter().map(|(s, r)| (s, *r))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl FromIterator<(Symbol, f64)> for RateSnapshot {
    fn from_iter<T: IntoIterator<Item = (Symbol, f64)>>(iter: T) -> Self {
        Self {
            rates: iter.into_iter().collect(),
            omitted: 0,
        }
    }
}

// =============================================================================
// RateCalculator
// =============================================================================

/// Computes one `RateSnapshot` per cycle
#[derive(Debug, Clone)]
pub struct RateCalculator {
    reference: ReferenceVenue,
    fetch_timeout: Duration,
    max_in_flight: usize,
}

impl RateCalculator {
    pub fn new(reference: ReferenceVenue, fetch_timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            reference,
            fetch_timeout,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Fetch both prices for every common symbol and compute spreads
    ///
    /// At most `max_in_flight` symbols are fetched concurrently, so each
    /// venue sees at most that many requests at once. Returns only after
    /// every fetch has completed, failed or timed out.
    pub async fn calculate<A, B>(&self, venue_a: &A, venue_b: &B, common: &CommonSymbols) -> RateSnapshot
    where
        A: PriceSource + ?Sized,
        B: PriceSource + ?Sized,
    {
        // Per-symbol futures own their keys; borrowing from `common` here
        // makes the enclosing future non-Send
        let pairs: Vec<(Symbol, SymbolPair)> = common
            .iter()
            .map(|(symbol, pair)| (symbol.clone(), pair.clone()))
            .collect();

        let results: Vec<(Symbol, Option<f64>)> = stream::iter(pairs)
            .map(|(symbol, pair)| async move {
                let rate = self.rate_for(venue_a, venue_b, &symbol, &pair).await;
                (symbol, rate)
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut snapshot = RateSnapshot::default();
        for (symbol, rate) in results {
            match rate {
                Some(rate) => {
                    snapshot.rates.insert(symbol, rate);
                }
                None => snapshot.omitted += 1,
            }
        }
        snapshot
    }

    async fn rate_for<A, B>(&self, venue_a: &A, venue_b: &B, symbol: &Symbol, pair: &SymbolPair) -> Option<f64>
    where
        A: PriceSource + ?Sized,
        B: PriceSource + ?Sized,
    {
        let (price_a, price_b) = tokio::join!(
            self.fetch(venue_a, &pair.native_a),
            self.fetch(venue_b, &pair.native_b),
        );

        let (price_a, price_b) = match (price_a, price_b) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) => {
                log_omission(symbol, venue_a.venue_name(), &e);
                return None;
            }
            (_, Err(e)) => {
                log_omission(symbol, venue_b.venue_name(), &e);
                return None;
            }
        };

        let rate = match self.reference {
            ReferenceVenue::A => spread_pct(price_a, price_b),
            ReferenceVenue::B => spread_pct(price_b, price_a),
        };

        match rate {
            Some(rate) => {
                debug!(
                    symbol = %symbol,
                    price_a = %price_a,
                    price_b = %price_b,
                    spread = %format!("{:.4}%", rate),
                    "Spread calculated"
                );
                Some(rate)
            }
            None => {
                warn!(symbol = %symbol, price_a = %price_a, price_b = %price_b, "Spread not computable, symbol omitted");
                None
            }
        }
    }

    async fn fetch<V>(&self, venue: &V, native_symbol: &str) -> VenueResult<Decimal>
    where
        V: PriceSource + ?Sized,
    {
        match tokio::time::timeout(self.fetch_timeout, venue.last_price(native_symbol)).await {
            Ok(result) => validate_reading(native_symbol, result?),
            Err(_) => Err(VenueError::NetworkTimeout(self.fetch_timeout.as_millis() as u64)),
        }
    }
}

/// Venue-wide failures log at `error`, per-symbol ones at `warn`
fn log_omission(symbol: &Symbol, venue: &str, err: &VenueError) {
    if err.is_venue_wide() {
        error!(symbol = %symbol, venue, error = %err, "Venue unavailable, symbol omitted");
    } else {
        warn!(symbol = %symbol, venue, error = %err, "Price unavailable, symbol omitted");
    }
}

// =============================================================================
// Tests
// =============================================================================
