//! Application-wide constants and configuration defaults
//!
//! These values back the serde defaults of the YAML configuration.
//! Each can be overridden via an environment variable.

use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Poll Cycle
// =============================================================================

/// Interval between the start of two poll cycles (default: 60 seconds)
///
/// Environment variable: `POLL_INTERVAL_SECS`
pub fn poll_interval_secs() -> u64 {
    env_or("POLL_INTERVAL_SECS", 60)
}

/// Fractional spread change that triggers an alert (default: 0.0001 = 0.01%)
///
/// Environment variable: `CHANGE_THRESHOLD`
pub fn change_threshold() -> f64 {
    env_or("CHANGE_THRESHOLD", 0.0001)
}

/// Per-price-fetch timeout (default: 5 seconds)
///
/// Environment variable: `FETCH_TIMEOUT_SECS`
pub fn fetch_timeout_secs() -> u64 {
    env_or("FETCH_TIMEOUT_SECS", 5)
}

/// Maximum symbols fetched concurrently within one cycle (default: 4)
///
/// Environment variable: `MAX_IN_FLIGHT_FETCHES`
pub fn max_in_flight_fetches() -> usize {
    env_or("MAX_IN_FLIGHT_FETCHES", 4)
}

/// Time an in-flight cycle may keep running after shutdown (default: 10 seconds)
///
/// Environment variable: `SHUTDOWN_GRACE_SECS`
pub fn shutdown_grace_secs() -> u64 {
    env_or("SHUTDOWN_GRACE_SECS", 10)
}

// =============================================================================
// Alert Delivery
// =============================================================================

/// Alert queue capacity (default: 1000 messages)
///
/// Environment variable: `ALERT_QUEUE_CAPACITY`
pub fn alert_queue_capacity() -> usize {
    env_or("ALERT_QUEUE_CAPACITY", 1000)
}

/// Notifier polling cadence (default: 120 seconds)
///
/// Environment variable: `NOTIFIER_INTERVAL_SECS`
pub fn notifier_interval_secs() -> u64 {
    env_or("NOTIFIER_INTERVAL_SECS", 120)
}

/// Messages delivered per notifier tick (default: 5, Discord allows ~5 req/2s per webhook)
///
/// Environment variable: `NOTIFIER_MAX_PER_POLL`
pub fn notifier_max_per_poll() -> usize {
    env_or("NOTIFIER_MAX_PER_POLL", 5)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all default values (for startup logs)
pub fn log_configuration() {
    tracing::info!("=== Default Configuration ===");
    tracing::info!("Poll cycle:");
    tracing::info!("  - Interval: {:?}", Duration::from_secs(poll_interval_secs()));
    tracing::info!("  - Change threshold: {}", change_threshold());
    tracing::info!("  - Fetch timeout: {:?}", Duration::from_secs(fetch_timeout_secs()));
    tracing::info!("  - Max in-flight fetches: {}", max_in_flight_fetches());
    tracing::info!("  - Shutdown grace: {:?}", Duration::from_secs(shutdown_grace_secs()));

    tracing::info!("Alerts:");
    tracing::info!("  - Queue capacity: {}", alert_queue_capacity());
    tracing::info!("  - Notifier interval: {:?}", Duration::from_secs(notifier_interval_secs()));
    tracing::info!("  - Max per poll: {}", notifier_max_per_poll());
    tracing::info!("==============================");
}
