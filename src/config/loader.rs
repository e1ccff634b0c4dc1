/// Configuration loading from TOML file
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::types::Config;

/// Where a loaded [`Config`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load the file if it exists, otherwise fall back to built-in defaults.
///
/// Runs before logging is set up, so the caller reports the source.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Config, ConfigSource)> {
    let path = path.as_ref();
    if !path.exists() {
        let config = Config::default();
        validate_config(&config)?;
        return Ok((config, ConfigSource::Defaults));
    }

    let config = load_config(path)?;
    Ok((config, ConfigSource::File(path.to_path_buf())))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| EngineError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    // Feed
    if config.feed.ws_url.is_empty() {
        return Err(EngineError::ConfigError("feed.ws_url is empty".to_string()));
    }

    if config.feed.max_reconnect_attempts == 0 {
        return Err(EngineError::ConfigError(
            "feed.max_reconnect_attempts must be >= 1".to_string(),
        ));
    }

    if config.feed.event_queue_capacity == 0 {
        return Err(EngineError::ConfigError(
            "feed.event_queue_capacity must be >= 1".to_string(),
        ));
    }

    // Gate
    if !config.gate.risk_threshold.is_finite() || config.gate.risk_threshold < 0.0 {
        return Err(EngineError::ConfigError(format!(
            "Invalid gate.risk_threshold: {}",
            config.gate.risk_threshold
        )));
    }

    if config.gate.assessment_timeout_ms == 0 {
        return Err(EngineError::ConfigError(
            "gate.assessment_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.gate.max_rejected_mints == 0 {
        return Err(EngineError::ConfigError(
            "gate.max_rejected_mints must be >= 1".to_string(),
        ));
    }

    if config.gate.max_requests_per_second == 0 {
        return Err(EngineError::ConfigError(
            "gate.max_requests_per_second must be >= 1".to_string(),
        ));
    }

    // Polling
    if config.polling.interval_ms == 0 || config.polling.fetch_timeout_ms == 0 {
        return Err(EngineError::ConfigError(
            "polling intervals must be > 0".to_string(),
        ));
    }

    if config.polling.error_backoff_ms < config.polling.interval_ms {
        return Err(EngineError::ConfigError(
            "polling.error_backoff_ms must be >= polling.interval_ms".to_string(),
        ));
    }

    if config.polling.max_requests_per_second == 0 {
        return Err(EngineError::ConfigError(
            "polling.max_requests_per_second must be >= 1".to_string(),
        ));
    }

    // Windows
    let windows = &config.windows;
    if windows.max_ticks == 0
        || windows.max_one_second_candles == 0
        || windows.max_fifteen_second_candles == 0
    {
        return Err(EngineError::ConfigError(
            "window capacities must be >= 1".to_string(),
        ));
    }

    // API
    if config.api.solana_tracker_url.is_empty() || config.api.jupiter_url.is_empty() {
        return Err(EngineError::ConfigError("api base URLs must be set".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [gate]
            risk_threshold = 6.5

            [windows]
            max_ticks = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.gate.risk_threshold, 6.5);
        assert_eq!(config.gate.rejected_organic_label, "low");
        assert_eq!(config.windows.max_ticks, 120);
        assert_eq!(config.windows.max_one_second_candles, 900);
        assert_eq!(config.feed.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_rejects_zero_reconnect_cap() {
        let result = parse_config(
            r#"
            [feed]
            max_reconnect_attempts = 0
            "#,
        );
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_backoff_shorter_than_interval() {
        let result = parse_config(
            r#"
            [polling]
            interval_ms = 2000
            error_backoff_ms = 500
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let (config, source) = load_or_default("does/not/exist/config.toml").unwrap();

        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.gate.max_rejected_mints, 10_000);
        assert_eq!(config.gate.max_requests_per_second, 10);
    }

    #[test]
    fn test_unreadable_path_is_file_error() {
        let result = load_config("does/not/exist/config.toml");
        assert!(matches!(result, Err(EngineError::FileError(_))));
    }

    #[test]
    fn test_rejects_zero_rejected_capacity() {
        let result = parse_config(
            r#"
            [gate]
            max_rejected_mints = 0
            "#,
        );
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }
}
