//! Configuration loader for YAML files
//!
//! This module handles loading and validating configuration from YAML files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AppError;

use super::types::AppConfig;

/// Load configuration from a YAML file
///
/// This function:
/// 1. Checks if the file exists
/// 2. Parses the YAML content
/// 3. Applies environment overrides (secrets)
/// 4. Validates the configuration rules
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use spread_watch::config::load_config;
///
/// let config = load_config(Path::new("config.yaml"))?;
/// ```
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut config: AppConfig = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!(
            "YAML parse error in '{}': {}",
            path.display(),
            e
        ))
    })?;

    config.apply_env_overrides();
    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string (useful for testing)
///
/// Environment overrides are not applied.
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    let config: AppConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {}", e)))?;

    config.validate()?;

    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReferenceVenue, VenueKind};
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG_YAML: &str = r#"
venues:
  a:
    kind: bybit
  b:
    kind: coinbase
monitor:
  poll_interval_secs: 30
  change_threshold: 0.0002
  reference_venue: a
  fetch_timeout_secs: 3
  max_in_flight: 2
  alert_queue_capacity: 50
notifier:
  poll_interval_secs: 60
  max_per_poll: 3
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(VALID_CONFIG_YAML).unwrap();
        assert_eq!(config.venues.a.kind, VenueKind::Bybit);
        assert_eq!(config.venues.b.kind, VenueKind::Coinbase);
        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(config.monitor.change_threshold, 0.0002);
        assert_eq!(config.monitor.reference_venue, ReferenceVenue::A);
        assert_eq!(config.notifier.max_per_poll, 3);
        assert!(config.history.path.is_none());
    }

    #[test]
    #[serial(env)]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
venues:
  a: { kind: bybit }
  b: { kind: coinbase }
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 60);
        assert_eq!(config.monitor.change_threshold, 0.0001);
        assert_eq!(config.monitor.fetch_timeout_secs, 5);
        assert_eq!(config.monitor.freshness_window_secs, None);
        assert_eq!(config.notifier.poll_interval_secs, 120);
    }

    #[test]
    fn test_custom_rules() {
        let yaml = r#"
venues:
  a:
    kind: bybit
    base_url: http://localhost:9000
    rules:
      reference_quote: USD
      quote_aliases: [USDT]
      contract_suffixes: [PERP]
      separators: ["-"]
  b: { kind: coinbase }
"#;
        let config = load_config_from_str(yaml).unwrap();
        let rules = config.venues.a.symbol_rules();
        assert_eq!(rules.quote_aliases, vec!["USDT".to_string()]);
        assert_eq!(config.venues.a.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_load_config_from_str_invalid_yaml() {
        let result = load_config_from_str("invalid: yaml: content: [");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_load_config_from_str_validation_failure() {
        let yaml = r#"
venues:
  a: { kind: coinbase }
  b: { kind: coinbase }
"#;
        let result = load_config_from_str(yaml);
        assert!(result.unwrap_err().to_string().contains("cannot be the same"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert!(result.unwrap_err().to_string().contains("Configuration file not found"));
    }

    #[test]
    #[serial(env)]
    fn test_load_config_from_file_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 30);
    }

    #[test]
    fn test_load_config_from_file_invalid_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"invalid: [yaml: content").unwrap();
        temp_file.flush().unwrap();

        let result = load_config(temp_file.path());
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    #[serial(env)]
    fn test_webhook_env_override() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        std::env::set_var("DISCORD_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc");
        let config = load_config(temp_file.path()).unwrap();
        std::env::remove_var("DISCORD_WEBHOOK_URL");

        assert_eq!(
            config.notifier.discord_webhook_url.as_deref(),
            Some("https://discord.com/api/webhooks/1/abc")
        );
    }
}
