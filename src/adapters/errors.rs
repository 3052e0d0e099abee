//! Venue error types
//!
//! Every failure a price source can report is wrapped in `VenueError`.
//! The monitoring core only cares whether a failure is venue-wide or
//! scoped to a single symbol; both are recovered locally by omission.

use std::time::Duration;

use thiserror::Error;

/// Price-source error types
#[derive(Error, Debug)]
pub enum VenueError {
    /// Venue-wide failure (connectivity, auth, 5xx)
    #[error("Venue unavailable: {0}")]
    VenueUnavailable(String),

    /// Single-symbol lookup failure
    #[error("Symbol unavailable {symbol}: {reason}")]
    SymbolUnavailable { symbol: String, reason: String },

    /// Price is zero, negative or otherwise unusable as a denominator
    #[error("Invalid reading for {symbol}: {price}")]
    InvalidReading { symbol: String, price: String },

    /// Request exceeded the per-fetch timeout
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from venue
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl VenueError {
    /// True when the failure affects every symbol on the venue
    pub fn is_venue_wide(&self) -> bool {
        matches!(
            self,
            VenueError::VenueUnavailable(_) | VenueError::NetworkTimeout(_)
        )
    }
}

impl VenueError {
    /// Classify a transport error from an HTTP venue client
    pub(crate) fn from_request(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            VenueError::NetworkTimeout(timeout.as_millis() as u64)
        } else if err.is_decode() {
            VenueError::InvalidResponse(err.to_string())
        } else {
            VenueError::VenueUnavailable(err.to_string())
        }
    }
}

/// Result type alias for venue operations
pub type VenueResult<T> = std::result::Result<T, VenueError>;
