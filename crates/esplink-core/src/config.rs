//! Link configuration.
//!
//! Every timing and capacity default can be overridden. Configuration is
//! plain data (serde, camelCase JSON) so the same structure can be loaded
//! from a file on Linux or baked into firmware.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    /// The configuration is not valid JSON or has the wrong shape.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but a value is unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkConfig {
    /// Period of the scheduler callback driving the engine.
    pub tick_interval_ms: u64,

    /// Periodically re-check the connection and rejoin when it dropped.
    pub auto_check: bool,

    /// Log raw radio traffic under the `esplink::wire` target.
    pub echo: bool,

    /// Per-state deadlines.
    pub timeouts: Timeouts,

    /// Fixed buffer and field sizes.
    pub capacities: Capacities,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            auto_check: true,
            echo: false,
            timeouts: Timeouts::default(),
            capacities: Capacities::default(),
        }
    }
}

impl LinkConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tickIntervalMs must be greater than zero".to_string(),
            ));
        }
        let caps = &self.capacities;
        for (name, value) in [
            ("accumulator", caps.accumulator),
            ("ssid", caps.ssid),
            ("host", caps.host),
            ("path", caps.path),
            ("response", caps.response),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "capacities.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    /// `AT` presence probe.
    pub presence_ms: u64,
    /// `AT+CIPAPMAC?` address query.
    pub address_ms: u64,
    /// Mode commands issued by the reset sequence.
    pub mode_ms: u64,
    /// `AT+RST` and `AT+RESTORE` until the `ready` banner.
    pub reset_ms: u64,
    /// `AT+CIPSTATUS`.
    pub status_ms: u64,
    /// `AT+CWJAP_DEF`.
    pub join_ms: u64,
    /// `AT+CIPSTART`.
    pub open_ms: u64,
    /// `AT+CIPSEND` until the data prompt.
    pub send_size_ms: u64,
    /// Request bytes until `SEND OK`.
    pub send_ack_ms: u64,
    /// `SEND OK` until the closing `</html>`.
    pub http_ms: u64,
    /// Interval between automatic connection checks.
    pub reconnect_check_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            presence_ms: 1_000,
            address_ms: 1_000,
            mode_ms: 1_000,
            reset_ms: 7_000,
            status_ms: 5_000,
            join_ms: 15_000,
            open_ms: 15_000,
            send_size_ms: 5_000,
            send_ack_ms: 5_000,
            http_ms: 12_000,
            reconnect_check_ms: 10_000,
        }
    }
}

/// Buffer and field capacities, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capacities {
    /// Response accumulator.
    pub accumulator: usize,
    /// Network identifier.
    pub ssid: usize,
    /// Network secret.
    pub password: usize,
    pub host: usize,
    pub path: usize,
    pub body: usize,
    /// Extracted response payload.
    pub response: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            accumulator: 8192,
            ssid: 31,
            password: 63,
            host: 255,
            path: 255,
            body: 1023,
            response: 8192,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.tick_interval_ms, 50);
        assert!(config.auto_check);
        assert_eq!(config.timeouts.join_ms, 15_000);
        assert_eq!(config.timeouts.http_ms, 12_000);
        assert_eq!(config.capacities.body, 1023);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LinkConfig::from_json_str(
            r#"{"tickIntervalMs": 20, "echo": true, "timeouts": {"httpMs": 30000}}"#,
        )
        .unwrap();

        assert_eq!(config.tick_interval_ms, 20);
        assert!(config.echo);
        assert_eq!(config.timeouts.http_ms, 30_000);
        assert_eq!(config.timeouts.open_ms, 15_000);
        assert_eq!(config.capacities, Capacities::default());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let err = LinkConfig::from_json_str(r#"{"tickIntervalMs": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = LinkConfig::from_json_str(r#"{"capacities": {"accumulator": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("capacities.accumulator"));
    }

    #[test]
    fn test_malformed_json() {
        let err = LinkConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
