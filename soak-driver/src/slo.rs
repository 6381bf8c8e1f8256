//! Service-level objective checks.
//!
//! Checks run on unrounded measurements, in a fixed priority order:
//! register success rate, heartbeat success rate, register p95, heartbeat
//! p95, missing relays.

use crate::config::DriverConfig;
use crate::stats::PhaseStats;
use std::fmt;

/// Raw measurements from a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunMeasurements {
    /// Relays in the run.
    pub relay_count: usize,
    /// Register phase results.
    pub register: PhaseStats,
    /// Results from every heartbeat wave.
    pub heartbeat: PhaseStats,
    /// Heartbeat waves executed.
    pub waves: usize,
    /// Run relay ids absent from the post-soak listing.
    pub missing: Vec<String>,
}

impl RunMeasurements {
    /// Register successes over the number of relays.
    pub fn register_success_rate(&self) -> f64 {
        if self.relay_count == 0 {
            0.0
        } else {
            self.register.successes() as f64 / self.relay_count as f64
        }
    }
}

/// Thresholds a run must meet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SloThresholds {
    /// Minimum success rate for both phases.
    pub min_success_rate: f64,
    /// Maximum register p95 latency (ms).
    pub max_register_p95_ms: f64,
    /// Maximum heartbeat p95 latency (ms).
    pub max_heartbeat_p95_ms: f64,
}

impl From<&DriverConfig> for SloThresholds {
    fn from(config: &DriverConfig) -> Self {
        Self {
            min_success_rate: config.min_success_rate,
            max_register_p95_ms: config.max_register_p95_ms,
            max_heartbeat_p95_ms: config.max_heartbeat_p95_ms,
        }
    }
}

/// One failed objective.
#[derive(Debug, Clone, PartialEq)]
pub enum SloViolation {
    /// Too many register calls failed.
    RegisterSuccessRate {
        /// Measured rate.
        actual: f64,
        /// Required minimum.
        threshold: f64,
    },
    /// Too many heartbeat calls failed.
    HeartbeatSuccessRate {
        /// Measured rate.
        actual: f64,
        /// Required minimum.
        threshold: f64,
    },
    /// Register tail latency too high.
    RegisterP95 {
        /// Measured p95 (ms).
        actual: f64,
        /// Allowed maximum (ms).
        threshold: f64,
    },
    /// Heartbeat tail latency too high.
    HeartbeatP95 {
        /// Measured p95 (ms).
        actual: f64,
        /// Allowed maximum (ms).
        threshold: f64,
    },
    /// Registered relays did not survive the soak.
    MissingRelays {
        /// How many are missing.
        count: usize,
        /// First missing relay id.
        example: String,
    },
}

impl fmt::Display for SloViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SloViolation::RegisterSuccessRate { actual, threshold } => write!(
                f,
                "register success rate {actual:.3} below threshold {threshold:.3}"
            ),
            SloViolation::HeartbeatSuccessRate { actual, threshold } => write!(
                f,
                "heartbeat success rate {actual:.3} below threshold {threshold:.3}"
            ),
            SloViolation::RegisterP95 { actual, threshold } => write!(
                f,
                "register p95 {actual:.2}ms above threshold {threshold:.2}ms"
            ),
            SloViolation::HeartbeatP95 { actual, threshold } => write!(
                f,
                "heartbeat p95 {actual:.2}ms above threshold {threshold:.2}ms"
            ),
            SloViolation::MissingRelays { count, example } => write!(
                f,
                "missing registered relays after soak: {count} (example={example})"
            ),
        }
    }
}

/// Check every objective and return the violations in priority order.
///
/// The first element, if any, is the reported cause of failure.
pub fn evaluate(measurements: &RunMeasurements, thresholds: &SloThresholds) -> Vec<SloViolation> {
    let mut violations = Vec::new();

    let register_rate = measurements.register_success_rate();
    if register_rate < thresholds.min_success_rate {
        violations.push(SloViolation::RegisterSuccessRate {
            actual: register_rate,
            threshold: thresholds.min_success_rate,
        });
    }

    let heartbeat_rate = measurements.heartbeat.success_rate();
    if heartbeat_rate < thresholds.min_success_rate {
        violations.push(SloViolation::HeartbeatSuccessRate {
            actual: heartbeat_rate,
            threshold: thresholds.min_success_rate,
        });
    }

    let register_p95 = measurements.register.p95_ms();
    if register_p95 > thresholds.max_register_p95_ms {
        violations.push(SloViolation::RegisterP95 {
            actual: register_p95,
            threshold: thresholds.max_register_p95_ms,
        });
    }

    let heartbeat_p95 = measurements.heartbeat.p95_ms();
    if heartbeat_p95 > thresholds.max_heartbeat_p95_ms {
        violations.push(SloViolation::HeartbeatP95 {
            actual: heartbeat_p95,
            threshold: thresholds.max_heartbeat_p95_ms,
        });
    }

    if let Some(first) = measurements.missing.first() {
        violations.push(SloViolation::MissingRelays {
            count: measurements.missing.len(),
            example: first.clone(),
        });
    }

    violations
}
