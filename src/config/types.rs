//! Configuration types for the spread monitor
//!
//! This module defines all configuration structs that are loaded from YAML.
//! Optional sections fall back to the env-overridable defaults in `constants`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::constants;
use crate::core::symbols::SymbolRules;
use crate::error::AppError;

// ============================================================================
// Enums
// ============================================================================

/// Supported venues
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Bybit,
    Coinbase,
}

impl std::fmt::Display for VenueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VenueKind::Bybit => write!(f, "bybit"),
            VenueKind::Coinbase => write!(f, "coinbase"),
        }
    }
}

/// Which venue is the denominator of the spread formula
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceVenue {
    #[default]
    A,
    B,
}

impl std::fmt::Display for ReferenceVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceVenue::A => write!(f, "a"),
            ReferenceVenue::B => write!(f, "b"),
        }
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One venue of the monitored pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue implementation
    pub kind: VenueKind,
    /// REST base URL override (production endpoint when absent)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Symbol normalization rules (per-kind defaults when absent)
    #[serde(default)]
    pub rules: Option<SymbolRules>,
}

impl VenueConfig {
    /// Rules in effect for this venue
    pub fn symbol_rules(&self) -> SymbolRules {
        self.rules
            .clone()
            .unwrap_or_else(|| SymbolRules::for_kind(self.kind))
    }
}

/// The two venues compared by the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuesConfig {
    /// Venue A (reference venue by default)
    pub a: VenueConfig,
    /// Venue B
    pub b: VenueConfig,
}

/// Poll cycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between the start of two cycles
    #[serde(default = "constants::poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Fractional change that triggers an alert (0.0001 = 0.01%)
    #[serde(default = "constants::change_threshold")]
    pub change_threshold: f64,
    /// Denominator venue of the spread formula
    #[serde(default)]
    pub reference_venue: ReferenceVenue,
    /// Per-price-fetch timeout in seconds
    #[serde(default = "constants::fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum symbols fetched concurrently
    #[serde(default = "constants::max_in_flight_fetches")]
    pub max_in_flight: usize,
    /// Alert queue capacity (newest alert rejected when full)
    #[serde(default = "constants::alert_queue_capacity")]
    pub alert_queue_capacity: usize,
    /// Seconds an in-flight cycle may run after shutdown
    #[serde(default = "constants::shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Optional freshness gate: alert only if previous update is within this window
    #[serde(default)]
    pub freshness_window_secs: Option<u64>,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn freshness_window(&self) -> Option<Duration> {
        self.freshness_window_secs.map(Duration::from_secs)
    }

    /// Validate monitor configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_secs < 1 {
            return Err(AppError::Config(
                "monitor.poll_interval_secs must be >= 1".to_string(),
            ));
        }

        if !self.change_threshold.is_finite() || self.change_threshold <= 0.0 {
            return Err(AppError::Config(format!(
                "monitor.change_threshold must be > 0 (got {})",
                self.change_threshold
            )));
        }

        // A fetch must not be able to outlive its cycle slot
        if self.fetch_timeout_secs < 1 || self.fetch_timeout_secs >= self.poll_interval_secs {
            return Err(AppError::Config(format!(
                "monitor.fetch_timeout_secs must be >= 1 and < poll_interval_secs ({}), got {}",
                self.poll_interval_secs, self.fetch_timeout_secs
            )));
        }

        if self.max_in_flight < 1 {
            return Err(AppError::Config(
                "monitor.max_in_flight must be >= 1".to_string(),
            ));
        }

        if self.alert_queue_capacity < 1 {
            return Err(AppError::Config(
                "monitor.alert_queue_capacity must be >= 1".to_string(),
            ));
        }

        if self.freshness_window_secs == Some(0) {
            return Err(AppError::Config(
                "monitor.freshness_window_secs must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: constants::poll_interval_secs(),
            change_threshold: constants::change_threshold(),
            reference_venue: ReferenceVenue::A,
            fetch_timeout_secs: constants::fetch_timeout_secs(),
            max_in_flight: constants::max_in_flight_fetches(),
            alert_queue_capacity: constants::alert_queue_capacity(),
            shutdown_grace_secs: constants::shutdown_grace_secs(),
            freshness_window_secs: None,
        }
    }
}

/// Alert delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Seconds between two queue polls
    #[serde(default = "constants::notifier_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum alerts delivered per poll
    #[serde(default = "constants::notifier_max_per_poll")]
    pub max_per_poll: usize,
    /// Discord webhook; alerts go to the log when absent
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
}

impl NotifierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_secs < 1 {
            return Err(AppError::Config(
                "notifier.poll_interval_secs must be >= 1".to_string(),
            ));
        }
        if self.max_per_poll < 1 {
            return Err(AppError::Config(
                "notifier.max_per_poll must be >= 1".to_string(),
            ));
        }
        if let Some(url) = &self.discord_webhook_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(AppError::Config(
                    "notifier.discord_webhook_url must be an http(s) URL".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: constants::notifier_interval_secs(),
            max_per_poll: constants::notifier_max_per_poll(),
            discord_webhook_url: None,
        }
    }
}

/// Optional spread history sink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// JSON-lines file; history disabled when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub venues: VenuesConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        // Rule: the two venues must be distinct endpoints
        if self.venues.a.kind == self.venues.b.kind
            && self.venues.a.base_url == self.venues.b.base_url
        {
            return Err(AppError::Config(format!(
                "venues.a and venues.b cannot be the same (both are {})",
                self.venues.a.kind
            )));
        }

        for (label, venue) in [("a", &self.venues.a), ("b", &self.venues.b)] {
            venue.symbol_rules().validate().map_err(|reason| {
                AppError::Config(format!("venues.{}.rules: {}", label, reason))
            })?;
        }

        self.monitor.validate()?;
        self.notifier.validate()?;

        Ok(())
    }

    /// Apply secrets from the environment on top of the file values
    ///
    /// `DISCORD_WEBHOOK_URL` overrides `notifier.discord_webhook_url`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.notifier.discord_webhook_url = Some(url.trim().to_string());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
