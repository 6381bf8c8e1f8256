//! # chaos-proxy
//!
//! TCP proxy that injects deterministic faults between a client and a
//! single upstream service.
//!
//! Each accepted connection gets a 1-based sequence number. With
//! `drop_every = N`, every Nth connection is closed on accept without
//! dialing upstream. Every other connection optionally waits `delay_ms`
//! in its own task, then is piped byte-for-byte to the upstream in both
//! directions. Once one direction ends, the other gets [`DRAIN_TIMEOUT`] to
//! finish before both sockets are closed.
//!
//! ```text
//! client ──► ChaosProxy ──► should_drop(seq)? ──► close
//!                 │
//!                 ▼
//!           sleep(delay) ──► dial upstream ──► pipe ⇄ pipe
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fault;
pub mod metrics;
pub mod pipe;
pub mod proxy;

pub use config::{ConfigError, PartialProxyConfig, ProxyConfig};
pub use error::{ProxyError, Result};
pub use fault::{should_drop, ConnectionSequencer};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use pipe::{pipe, PipeDirection, CHUNK_SIZE};
pub use proxy::{ChaosProxy, DRAIN_TIMEOUT};

use std::path::Path;

/// Resolve the proxy configuration from an optional TOML file with `flags`
/// laid over it.
///
/// # Errors
///
/// Returns [`ProxyError::Config`] if the file cannot be read or parsed, or
/// a required port is missing or invalid.
pub fn load_config(path: Option<&Path>, flags: PartialProxyConfig) -> Result<ProxyConfig> {
    let base = match path {
        Some(path) => PartialProxyConfig::from_file(path)?,
        None => PartialProxyConfig::default(),
    };
    Ok(base.overlay(flags).resolve()?)
}
