//! Configuration loading for the chaos proxy.
//!
//! Every setting may come from a TOML file or the command line; both are
//! parsed into a [`PartialProxyConfig`], the command line is laid over the
//! file, and the result is resolved into a [`ProxyConfig`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Host to listen on (default: 127.0.0.1).
    pub listen_host: String,
    /// Port to listen on. 0 binds an ephemeral port.
    pub listen_port: u16,
    /// Upstream host (default: 127.0.0.1).
    pub target_host: String,
    /// Upstream port.
    pub target_port: u16,
    /// Delay before dialing upstream for each kept connection, 0 = off.
    pub delay_ms: u64,
    /// Close every Nth accepted connection, 0 = off.
    pub drop_every: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl ProxyConfig {
    /// Config forwarding `listen_port` to `target_port` on localhost with no faults.
    pub fn new(listen_port: u16, target_port: u16) -> Self {
        Self {
            listen_host: default_host(),
            listen_port,
            target_host: default_host(),
            target_port,
            delay_ms: 0,
            drop_every: 0,
        }
    }

    /// Set the per-connection delay.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the drop period.
    pub fn with_drop_every(mut self, drop_every: u64) -> Self {
        self.drop_every = drop_every;
        self
    }

    /// `host:port` to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// `host:port` to dial for each session.
    pub fn target_addr(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }

    /// Per-connection delay, if enabled.
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}

/// Proxy settings where any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialProxyConfig {
    /// See [`ProxyConfig::listen_host`].
    pub listen_host: Option<String>,
    /// See [`ProxyConfig::listen_port`].
    pub listen_port: Option<u16>,
    /// See [`ProxyConfig::target_host`].
    pub target_host: Option<String>,
    /// See [`ProxyConfig::target_port`].
    pub target_port: Option<u16>,
    /// See [`ProxyConfig::delay_ms`].
    pub delay_ms: Option<u64>,
    /// See [`ProxyConfig::drop_every`].
    pub drop_every: Option<u64>,
}

impl PartialProxyConfig {
    /// Load settings from a TOML file.
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

    /// Lay `top` over `self`; fields set in `top` win.
    pub fn overlay(self, top: PartialProxyConfig) -> Self {
        Self {
            listen_host: top.listen_host.or(self.listen_host),
            listen_port: top.listen_port.or(self.listen_port),
            target_host: top.target_host.or(self.target_host),
            target_port: top.target_port.or(self.target_port),
            delay_ms: top.delay_ms.or(self.delay_ms),
            drop_every: top.drop_every.or(self.drop_every),
        }
    }

    /// Fill defaults and check required fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a port is missing or a value is out of range.
    pub fn resolve(self) -> Result<ProxyConfig, ConfigError> {
        let listen_port = self
            .listen_port
            .ok_or(ConfigError::MissingPort("listen_port"))?;
        let target_port = self
            .target_port
            .ok_or(ConfigError::MissingPort("target_port"))?;
        if target_port == 0 {
            return Err(ConfigError::Invalid {
                field: "target_port",
                reason: "must be non-zero".into(),
            });
        }

        let listen_host = self.listen_host.unwrap_or_else(default_host);
        let target_host = self.target_host.unwrap_or_else(default_host);
        for (field, host) in [("listen_host", &listen_host), ("target_host", &target_host)] {
            if host.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".into(),
                });
            }
        }

        Ok(ProxyConfig {
            listen_host,
            listen_port,
            target_host,
            target_port,
            delay_ms: self.delay_ms.unwrap_or(0),
            drop_every: self.drop_every.unwrap_or(0),
        })
    }
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
    /// A port was given neither in the file nor on the command line.
    #[error("{0} is required")]
    MissingPort(&'static str),
    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
