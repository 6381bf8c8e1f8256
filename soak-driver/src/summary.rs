//! Machine-readable run summary.

use crate::slo::RunMeasurements;
use crate::stats::round_to;
use serde::{Deserialize, Serialize};

/// Aggregate result of a run, printed as JSON on stdout.
///
/// Rates are rounded to 4 decimal places and latencies to 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// 95th percentile heartbeat latency (ms).
    pub heartbeat_p95_ms: f64,
    /// Heartbeat successes over heartbeat calls.
    pub heartbeat_success_rate: f64,
    /// Heartbeat calls across every wave.
    pub heartbeat_total: usize,
    /// Mean heartbeat latency (ms).
    pub mean_heartbeat_ms: f64,
    /// Run relays absent from the post-soak listing.
    pub missing_registered_relays: usize,
    /// 95th percentile register latency (ms).
    pub register_p95_ms: f64,
    /// Register successes over relay count.
    pub register_success_rate: f64,
    /// Relays in the run.
    pub relay_count: usize,
}

impl RunSummary {
    /// Summarize raw measurements.
    pub fn from_measurements(m: &RunMeasurements) -> Self {
        Self {
            heartbeat_p95_ms: round_to(m.heartbeat.p95_ms(), 2),
            heartbeat_success_rate: round_to(m.heartbeat.success_rate(), 4),
            heartbeat_total: m.heartbeat.total(),
            mean_heartbeat_ms: round_to(m.heartbeat.mean_ms(), 2),
            missing_registered_relays: m.missing.len(),
            register_p95_ms: round_to(m.register.p95_ms(), 2),
            register_success_rate: round_to(m.register_success_rate(), 4),
            relay_count: m.relay_count,
        }
    }

    /// Pretty-printed JSON with keys in sorted order.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        // serde_json's Map is a BTreeMap, so going through Value sorts keys
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }
}
