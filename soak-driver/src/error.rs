//! Error types for the soak driver.
//!
//! Per-call failures never show up here: they are folded into the phase
//! statistics. These errors cover what stops a run from starting or from
//! reporting its result.

use std::path::PathBuf;

/// Main error type for soak driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The run summary could not be encoded.
    #[error("failed to encode run summary: {0}")]
    Summary(#[from] serde_json::Error),

    /// Writing the summary file failed.
    #[error("failed to write summary to {path}: {source}")]
    SummaryWrite {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors from the control-plane listing call.
///
/// Register and heartbeat calls do not return errors; they produce a
/// [`CallResult`](crate::control_plane::CallResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// The request never produced a response (connect, timeout, DNS).
    #[error("request failed: {0}")]
    Request(String),

    /// The control plane answered with a non-2xx status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body was not the expected JSON shape.
    #[error("unexpected response body: {0}")]
    UnexpectedBody(String),
}

impl From<reqwest::Error> for ControlPlaneError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ControlPlaneError::Status(status.as_u16()),
            None if e.is_decode() => ControlPlaneError::UnexpectedBody(e.to_string()),
            None => ControlPlaneError::Request(e.to_string()),
        }
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
