//! Cross-venue spread watch
//!
//! Polls two venues for last-trade prices of the symbols they both quote,
//! computes the percentage spread per symbol and alerts when a spread moves
//! by more than a relative threshold between two consecutive cycles.
//!
//! - `adapters`: venue price sources (Bybit, Coinbase)
//! - `core`: reconciliation, spread calculation, change detection, scheduling
//! - `notify`: alert delivery

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod notify;

pub use error::AppError;
