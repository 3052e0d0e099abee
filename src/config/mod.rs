//! Configuration module for monitor settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `VenuesConfig`, `MonitorConfig`, `NotifierConfig`)
//! - YAML loading functionality (`load_config`)
//! - Defaults with environment variable overrides (`constants`)

pub mod constants;
mod loader;
mod types;

// Re-export types
pub use types::{
    AppConfig, HistoryConfig, MonitorConfig, NotifierConfig, ReferenceVenue, VenueConfig,
    VenueKind, VenuesConfig,
};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
