//! Typed adapter configuration
//!
//! Explicit construction validated up front, plus TOML file loading for
//! applications that keep adapter settings on disk. Validation happens at
//! load and again at build time; nothing is wired by reflection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Settings owned by a single adapter instance. Immutable once the adapter
/// starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterConfig {
    /// Client identifier presented to the broker (must match [a-zA-Z0-9._-]+)
    pub client_id: String,
    /// Broker URL with scheme and port, e.g. `tcp://localhost:1883`
    pub broker_url: String,
    /// Start automatically when the owning group starts (default: true)
    #[serde(default = "default_auto_startup")]
    pub auto_startup: bool,
    /// Relative start order; lower phases start first and stop last
    #[serde(default)]
    pub phase: i32,
    /// Upper bound in milliseconds on blocking sink delivery
    /// (absent = block indefinitely, 0 = no wait)
    #[serde(default)]
    pub send_timeout_ms: Option<u64>,
    /// Delay in milliseconds between broker session recovery attempts
    /// (default: 5000)
    #[serde(default = "default_recovery_interval_ms")]
    pub recovery_interval_ms: u64,
}

fn default_auto_startup() -> bool {
    true
}

fn default_recovery_interval_ms() -> u64 {
    5000
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl AdapterConfig {
    /// Settings with defaults for everything but the identity fields
    pub fn new<C: Into<String>, U: Into<String>>(client_id: C, broker_url: U) -> Self {
        Self {
            client_id: client_id.into(),
            broker_url: broker_url.into(),
            auto_startup: default_auto_startup(),
            phase: 0,
            send_timeout_ms: None,
            recovery_interval_ms: default_recovery_interval_ms(),
        }
    }

    /// Load and validate settings from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: AdapterConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field contents; called by `load_from_file` and at build time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty()
            || !self
                .client_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::Validation(format!(
                "client_id '{}' must match [a-zA-Z0-9._-]+",
                self.client_id
            )));
        }
        if self.broker_url.is_empty() {
            return Err(ConfigError::Validation(
                "broker_url must not be empty".to_string(),
            ));
        }
        if Url::parse(&self.broker_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "broker_url '{}' is not a valid url",
                self.broker_url
            )));
        }
        if self.recovery_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "recovery_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Send timeout as a duration, if bounded
    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_ms.map(Duration::from_millis)
    }

    /// Recovery interval as a duration
    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}
