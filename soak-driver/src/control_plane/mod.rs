//! Control-plane client abstraction.
//!
//! The driver talks to the relay control plane through the [`ControlPlane`]
//! trait so phases can run against the real HTTP API or against a scripted
//! mock.
//!
//! # Design
//!
//! Register and heartbeat calls never fail with an error: every outcome,
//! including timeouts and refused connections, is a [`CallResult`] that the
//! phase folds into its statistics. Only the post-soak listing can error,
//! because without it there is nothing to compare against.

mod http;
mod mock;

pub use http::HttpControlPlane;
pub use mock::MockControlPlane;

use crate::error::ControlPlaneError;
use async_trait::async_trait;
use serde::Serialize;

/// Registration request path.
pub const REGISTER_PATH: &str = "/v1/relays/register";
/// Heartbeat request path.
pub const HEARTBEAT_PATH: &str = "/v1/relays/heartbeat";
/// Relay listing path.
pub const LIST_PATH: &str = "/v1/relays";

/// Outcome of one register or heartbeat call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallResult {
    /// Whether the status was in the 2xx range.
    pub ok: bool,
    /// Wall-clock time spent on the call, including any error path.
    pub elapsed_ms: f64,
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
}

impl CallResult {
    /// Build a result from a received HTTP status.
    pub fn from_status(status: u16, elapsed_ms: f64) -> Self {
        Self {
            ok: (200..300).contains(&status),
            elapsed_ms,
            status,
        }
    }

    /// Build a result for a call that never got a response.
    pub fn transport_failure(elapsed_ms: f64) -> Self {
        Self {
            ok: false,
            elapsed_ms,
            status: 0,
        }
    }

    /// True when the failure happened below HTTP (connect, timeout, DNS).
    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }
}

/// Body of `POST /v1/relays/register`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRequest {
    /// Relay id.
    pub relay_id: String,
    /// Advertised endpoints (always exactly one here).
    pub endpoints: Vec<String>,
    /// Region label.
    pub region: String,
    /// Autonomous system number.
    pub asn: u32,
    /// Session capacity.
    pub max_sessions: u32,
    /// Bitrate capacity.
    pub max_bitrate_kbps: u32,
    /// Feature flags.
    pub features: Vec<String>,
}

impl RegisterRequest {
    /// Fixed-shape registration for a synthetic relay.
    ///
    /// Everything except the id and endpoint is a constant; capacity is not
    /// under test.
    pub fn synthetic(relay_id: &str, endpoint: String) -> Self {
        Self {
            relay_id: relay_id.to_string(),
            endpoints: vec![endpoint],
            region: "loadtest-us".into(),
            asn: 64512,
            max_sessions: 256,
            max_bitrate_kbps: 20000,
            features: vec!["ipv4".into()],
        }
    }
}

/// Body of `POST /v1/relays/heartbeat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatRequest {
    /// Relay id.
    pub relay_id: String,
    /// Reported load percentage.
    pub load_pct: f64,
}

/// Client for the relay control-plane API.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Register one relay.
    async fn register(&self, request: RegisterRequest) -> CallResult;

    /// Send one heartbeat.
    async fn heartbeat(&self, request: HeartbeatRequest) -> CallResult;

    /// Fetch the full relay listing as raw JSON entries.
    async fn list_relays(&self) -> Result<Vec<serde_json::Value>, ControlPlaneError>;
}
