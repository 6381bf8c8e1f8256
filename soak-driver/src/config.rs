//! Configuration loading for the soak driver.
//!
//! Settings come from an optional TOML file, then command-line overrides are
//! applied on top. The merged result is validated before any load is sent.

use crate::relay::MAX_SAFE_RELAYS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved driver configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriverConfig {
    /// Control-plane base URL (required, no trailing slash after validation).
    #[serde(default)]
    pub master_url: String,
    /// Number of synthetic relays registered in the run (default: 30).
    #[serde(default = "default_relay_count")]
    pub relay_count: usize,
    /// Heartbeat soak duration in seconds (default: 25).
    #[serde(default = "default_soak_seconds")]
    pub soak_seconds: u64,
    /// Target interval between heartbeat waves in seconds (default: 1.0).
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    /// Per-call timeout in seconds (default: 3.0).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
    /// Maximum calls in flight per phase (default: 16).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Minimum success rate for both phases (default: 0.98).
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
    /// Maximum register p95 latency in milliseconds (default: 400).
    #[serde(default = "default_max_register_p95_ms")]
    pub max_register_p95_ms: f64,
    /// Maximum heartbeat p95 latency in milliseconds (default: 450).
    #[serde(default = "default_max_heartbeat_p95_ms")]
    pub max_heartbeat_p95_ms: f64,
}

// Default value functions
fn default_relay_count() -> usize {
    30
}

fn default_soak_seconds() -> u64 {
    25
}

fn default_interval_seconds() -> f64 {
    1.0
}

fn default_timeout_seconds() -> f64 {
    3.0
}

fn default_workers() -> usize {
    16
}

fn default_min_success_rate() -> f64 {
    0.98
}

fn default_max_register_p95_ms() -> f64 {
    400.0
}

fn default_max_heartbeat_p95_ms() -> f64 {
    450.0
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            master_url: String::new(),
            relay_count: default_relay_count(),
            soak_seconds: default_soak_seconds(),
            interval_seconds: default_interval_seconds(),
            timeout_seconds: default_timeout_seconds(),
            workers: default_workers(),
            min_success_rate: default_min_success_rate(),
            max_register_p95_ms: default_max_register_p95_ms(),
            max_heartbeat_p95_ms: default_max_heartbeat_p95_ms(),
        }
    }
}

/// Command-line values that take precedence over the config file.
///
/// `None` leaves the file (or default) value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// See [`DriverConfig::master_url`].
    pub master_url: Option<String>,
    /// See [`DriverConfig::relay_count`].
    pub relay_count: Option<usize>,
    /// See [`DriverConfig::soak_seconds`].
    pub soak_seconds: Option<u64>,
    /// See [`DriverConfig::interval_seconds`].
    pub interval_seconds: Option<f64>,
    /// See [`DriverConfig::timeout_seconds`].
    pub timeout_seconds: Option<f64>,
    /// See [`DriverConfig::workers`].
    pub workers: Option<usize>,
    /// See [`DriverConfig::min_success_rate`].
    pub min_success_rate: Option<f64>,
    /// See [`DriverConfig::max_register_p95_ms`].
    pub max_register_p95_ms: Option<f64>,
    /// See [`DriverConfig::max_heartbeat_p95_ms`].
    pub max_heartbeat_p95_ms: Option<f64>,
}

impl DriverConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply command-line overrides on top of this configuration.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.master_url {
            self.master_url = v;
        }
        if let Some(v) = overrides.relay_count {
            self.relay_count = v;
        }
        if let Some(v) = overrides.soak_seconds {
            self.soak_seconds = v;
        }
        if let Some(v) = overrides.interval_seconds {
            self.interval_seconds = v;
        }
        if let Some(v) = overrides.timeout_seconds {
            self.timeout_seconds = v;
        }
        if let Some(v) = overrides.workers {
            self.workers = v;
        }
        if let Some(v) = overrides.min_success_rate {
            self.min_success_rate = v;
        }
        if let Some(v) = overrides.max_register_p95_ms {
            self.max_register_p95_ms = v;
        }
        if let Some(v) = overrides.max_heartbeat_p95_ms {
            self.max_heartbeat_p95_ms = v;
        }
        self
    }

    /// Check every numeric range and normalize the master URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let url = self.master_url.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(ConfigError::invalid("master_url", "is required"));
        }
        match reqwest::Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::invalid(
                    "master_url",
                    format!("unsupported scheme '{}'", parsed.scheme()),
                ))
            }
            Err(e) => return Err(ConfigError::invalid("master_url", e.to_string())),
        }
        self.master_url = url;

        if self.relay_count == 0 || self.relay_count > MAX_SAFE_RELAYS {
            return Err(ConfigError::invalid(
                "relay_count",
                format!("must be between 1 and {MAX_SAFE_RELAYS}"),
            ));
        }
        if self.soak_seconds == 0 {
            return Err(ConfigError::invalid("soak_seconds", "must be positive"));
        }
        check_seconds("interval_seconds", self.interval_seconds)?;
        check_seconds("timeout_seconds", self.timeout_seconds)?;
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err(ConfigError::invalid(
                "min_success_rate",
                "must be within [0, 1]",
            ));
        }
        check_positive("max_register_p95_ms", self.max_register_p95_ms)?;
        check_positive("max_heartbeat_p95_ms", self.max_heartbeat_p95_ms)?;

        Ok(self)
    }

    /// Heartbeat soak duration.
    pub fn soak_duration(&self) -> Duration {
        Duration::from_secs(self.soak_seconds)
    }

    /// Target wave interval. Only meaningful after [`validate`](Self::validate).
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_seconds).unwrap_or_default()
    }

    /// Per-call timeout. Only meaningful after [`validate`](Self::validate).
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or_default()
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be a positive number"))
    }
}

fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_positive(field, value)?;
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
