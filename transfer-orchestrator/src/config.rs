//! Configuration for the transfer orchestrator

use crate::{Error, Result};
use risk_engine::{RiskConfig, RiskLevel};
use route_optimizer::RoutingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collaborator call timeouts
    pub timeouts: TimeoutConfig,

    /// Fraud scoring
    pub risk: RiskConfig,

    /// Route ranking
    pub routing: RoutingConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Collaborator call timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Rate oracle timeout in milliseconds; on expiry the rate falls back to 1
    pub rate_oracle_ms: u64,

    /// Ledger store timeout in milliseconds; on expiry the step fails
    pub ledger_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            rate_oracle_ms: 2000,
            ledger_ms: 5000,
        }
    }
}

impl TimeoutConfig {
    /// Rate oracle timeout
    pub fn rate_oracle(&self) -> Duration {
        Duration::from_millis(self.rate_oracle_ms)
    }

    /// Ledger store timeout
    pub fn ledger(&self) -> Duration {
        Duration::from_millis(self.ledger_ms)
    }
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults overlaid with `BRIDGE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Config::default().with_env()
    }

    /// Overlay `BRIDGE_*` environment variables
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup
    ///
    /// Recognised keys: `BRIDGE_RATE_ORACLE_TIMEOUT_MS`,
    /// `BRIDGE_LEDGER_TIMEOUT_MS`, `BRIDGE_UTC_OFFSET_SECONDS`,
    /// `BRIDGE_BLOCK_LEVEL`, `BRIDGE_MAX_SUGGESTIONS`, `BRIDGE_LOG_LEVEL`,
    /// `BRIDGE_LOG_JSON`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = lookup("BRIDGE_RATE_ORACLE_TIMEOUT_MS") {
            self.timeouts.rate_oracle_ms = parse("BRIDGE_RATE_ORACLE_TIMEOUT_MS", &ms)?;
        }

        if let Some(ms) = lookup("BRIDGE_LEDGER_TIMEOUT_MS") {
            self.timeouts.ledger_ms = parse("BRIDGE_LEDGER_TIMEOUT_MS", &ms)?;
        }

        if let Some(offset) = lookup("BRIDGE_UTC_OFFSET_SECONDS") {
            self.risk.utc_offset_seconds = parse("BRIDGE_UTC_OFFSET_SECONDS", &offset)?;
        }

        if let Some(level) = lookup("BRIDGE_BLOCK_LEVEL") {
            self.risk.block_level = match level.trim().to_ascii_lowercase().as_str() {
                "low" => RiskLevel::Low,
                "medium" => RiskLevel::Medium,
                "high" => RiskLevel::High,
                "critical" => RiskLevel::Critical,
                other => {
                    return Err(Error::Config(format!(
                        "BRIDGE_BLOCK_LEVEL: unknown risk level '{}'",
                        other
                    )))
                }
            };
        }

        if let Some(max) = lookup("BRIDGE_MAX_SUGGESTIONS") {
            self.routing.max_suggestions = parse("BRIDGE_MAX_SUGGESTIONS", &max)?;
        }

        if let Some(level) = lookup("BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(json) = lookup("BRIDGE_LOG_JSON") {
            self.logging.json = parse("BRIDGE_LOG_JSON", &json)?;
        }

        Ok(self)
    }

    /// Reject nonsensical values
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.rate_oracle_ms == 0 || self.timeouts.ledger_ms == 0 {
            return Err(Error::Config("Timeouts must be non-zero".to_string()));
        }
        self.risk.validate()?;
        self.routing.validate()?;
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{}: cannot parse '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeouts.rate_oracle_ms, 2000);
        assert_eq!(config.timeouts.ledger_ms, 5000);
        assert_eq!(config.routing.max_suggestions, 5);
        assert_eq!(config.risk.daily_creation_limit, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[timeouts]
rate_oracle_ms = 250

[risk]
utc_offset_seconds = 25200
block_level = "high"

[routing.cost_weights]
cost = 0.8
speed = 0.1
reliability = 0.2

[logging]
json = true
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.timeouts.rate_oracle_ms, 250);
        assert_eq!(config.timeouts.ledger_ms, 5000);
        assert_eq!(config.risk.utc_offset_seconds, 25200);
        assert_eq!(config.risk.block_level, RiskLevel::High);
        assert_eq!(config.risk.daily_replacement_limit, 3);
        assert_eq!(config.routing.cost_weights.cost, 0.8);
        assert_eq!(config.routing.max_suggestions, 5);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeouts = 12").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            Config::from_file("/nonexistent/bridge.toml"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BRIDGE_LEDGER_TIMEOUT_MS", "750"),
            ("BRIDGE_BLOCK_LEVEL", "Medium"),
            ("BRIDGE_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.timeouts.ledger_ms, 750);
        assert_eq!(config.risk.block_level, RiskLevel::Medium);
        assert!(config.logging.json);
    }

    #[test]
    fn test_override_parse_failure() {
        let result = Config::default().with_overrides(|key| {
            (key == "BRIDGE_LEDGER_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.timeouts.ledger_ms = 0;
        assert!(config.validate().is_err());
    }
}
