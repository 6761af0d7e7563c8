//! Configuration loader
//!
//! Loads and validates configuration from TOML files matching config.toml
//! structure. Secrets (API keys) come from the environment, never from the
//! file; URL-style settings allow environment overrides for deploys that
//! cannot edit the file.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub venues: VenuesSection,
    pub oracle: OracleSection,
    pub execution: ExecutionSection,
    pub monitor: MonitorSection,
    pub logging: LoggingSection,
}

/// Venue execution service endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct VenuesSection {
    /// Hyperliquid execution service base URL
    pub hyperliquid_url: String,
    /// Ostium execution service base URL
    pub ostium_url: String,
    /// Module-executor service base URL (spot)
    pub module_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl VenuesSection {
    /// API key for the venue services, environment only.
    pub fn api_key(&self) -> Option<String> {
        std::env::var("VENUE_PILOT_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

/// Price oracle service
#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    pub url: String,
}

impl OracleSection {
    /// Oracle URL with environment variable override
    pub fn get_url(&self) -> String {
        std::env::var("VENUE_PILOT_ORACLE_URL").unwrap_or_else(|_| self.url.clone())
    }
}

/// Execution parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    /// Slippage tolerance in basis points
    pub slippage_bps: u16,
    /// End-to-end submission timeout in seconds
    pub submit_timeout_secs: u64,
    /// Retry attempts for transient venue failures
    pub max_retries: u32,
    /// Flat platform fee charged per opened position, in USD
    #[serde(default)]
    pub platform_fee_usd: f64,
}

/// Exit monitor parameters
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Seconds between evaluation passes
    pub tick_interval_secs: u64,
    /// Positions evaluated concurrently per pass
    pub max_concurrent: usize,
    /// Failed close attempts before a position is marked stuck
    pub close_retry_budget: u32,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("hyperliquid_url", &self.venues.hyperliquid_url),
            ("ostium_url", &self.venues.ostium_url),
            ("module_url", &self.venues.module_url),
            ("oracle.url", &self.oracle.url),
        ] {
            if url.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} cannot be empty"
                )));
            }
        }

        if self.venues.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.execution.slippage_bps >= 10_000 {
            return Err(ConfigError::ValidationError(format!(
                "slippage_bps must be < 10000, got {}",
                self.execution.slippage_bps
            )));
        }

        if self.execution.submit_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "submit_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent must be > 0".to_string(),
            ));
        }

        if self.execution.platform_fee_usd < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "platform_fee_usd cannot be negative, got {}",
                self.execution.platform_fee_usd
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
[venues]
hyperliquid_url = "http://localhost:3001"
ostium_url = "http://localhost:3002"
module_url = "http://localhost:3003"
request_timeout_secs = 30

[oracle]
url = "http://localhost:3004"

[execution]
slippage_bps = 100
submit_timeout_secs = 90
max_retries = 3
platform_fee_usd = 0.5

[monitor]
tick_interval_secs = 30
max_concurrent = 8
close_retry_budget = 3

[logging]
level = "info"
"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(VALID);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.execution.slippage_bps, 100);
        assert!((config.execution.platform_fee_usd - 0.5).abs() < 1e-9);
        assert_eq!(config.monitor.max_concurrent, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_url_rejected() {
        let broken = VALID.replace("http://localhost:3002", "");
        let file = write_config(&broken);
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_excessive_slippage_rejected() {
        let broken = VALID.replace("slippage_bps = 100", "slippage_bps = 10000");
        let file = write_config(&broken);
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let broken = VALID.replace("tick_interval_secs = 30", "tick_interval_secs = 0");
        let file = write_config(&broken);
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_platform_fee_defaults_to_zero() {
        let trimmed = VALID.replace("platform_fee_usd = 0.5\n", "");
        let file = write_config(&trimmed);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.execution.platform_fee_usd, 0.0);
    }

    #[test]
    fn test_negative_platform_fee_rejected() {
        let broken = VALID.replace("platform_fee_usd = 0.5", "platform_fee_usd = -1.0");
        let file = write_config(&broken);
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let file = write_config("not toml at all [");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
