//! # soak-driver
//!
//! Synthetic load and soak driver for the relay control plane.
//!
//! A run has three phases:
//! - **Register**: one `POST /v1/relays/register` per synthetic relay,
//!   issued concurrently through a bounded worker pool
//! - **Soak**: heartbeat waves (`POST /v1/relays/heartbeat` for every relay)
//!   repeated at a fixed interval until the soak duration has elapsed
//! - **Verify**: one `GET /v1/relays` to confirm every relay is still listed
//!
//! The measurements are then checked against service-level objectives
//! (success rate, p95 latency, missing relays).
//!
//! ## Architecture
//!
//! ```text
//! DriverConfig ──► SoakRunner ──► dyn ControlPlane ──► HTTP / mock
//!                      │
//!                      ▼
//!              RunMeasurements ──► evaluate() ──► Vec<SloViolation>
//!                      │
//!                      ▼
//!                 RunSummary (JSON on stdout)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod control_plane;
pub mod error;
pub mod relay;
pub mod runner;
pub mod slo;
pub mod stats;
pub mod summary;

pub use config::{ConfigError, ConfigOverrides, DriverConfig};
pub use control_plane::{CallResult, ControlPlane, HttpControlPlane, MockControlPlane};
pub use error::{ControlPlaneError, DriverError, Result};
pub use relay::{generate_endpoint, RelayIdentity, MAX_SAFE_RELAYS};
pub use runner::{RunOutcome, SoakRunner};
pub use slo::{RunMeasurements, SloThresholds, SloViolation};
pub use stats::{percentile, PhaseStats};
pub use summary::RunSummary;

use std::path::Path;
use std::sync::Arc;

/// Load the driver configuration: optional TOML file, then `overrides`,
/// then validation.
///
/// # Errors
///
/// Returns [`DriverError::Config`] if the file cannot be read or parsed, or
/// the merged settings are invalid.
pub fn load_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<DriverConfig> {
    let base = match path {
        Some(path) => DriverConfig::from_file(path)?,
        None => DriverConfig::default(),
    };
    Ok(base.with_overrides(overrides).validate()?)
}

/// Build an HTTP-backed runner from a validated configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn http_runner(config: DriverConfig) -> Result<SoakRunner> {
    let control_plane = HttpControlPlane::new(&config.master_url, config.timeout())?;
    Ok(SoakRunner::new(config, Arc::new(control_plane)))
}

/// Write the summary JSON to `path`.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = summary.to_json_pretty()?;
    std::fs::write(path, json + "\n").map_err(|e| DriverError::SummaryWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
