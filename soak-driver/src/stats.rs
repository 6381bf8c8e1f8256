//! Latency and success accounting for one phase.

use crate::control_plane::CallResult;

/// Order-statistic percentile over latency samples.
///
/// Sorts ascending and takes the value at `floor((n - 1) * pct)`. There is
/// no interpolation between neighbours. An empty slice yields `0.0`.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut ordered = values.to_vec();
    ordered.sort_by(f64::total_cmp);
    let idx = ((ordered.len() - 1) as f64 * pct) as usize;
    ordered[idx.min(ordered.len() - 1)]
}

/// Round to a fixed number of decimal places, exact ties to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Accumulated results for one phase (register, or every heartbeat wave).
///
/// Owned by the task draining the phase's results, so recording needs no
/// synchronization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseStats {
    total: usize,
    successes: usize,
    latencies_ms: Vec<f64>,
}

impl PhaseStats {
    /// Fold one call into the totals.
    ///
    /// Failed calls still contribute their elapsed time.
    pub fn record(&mut self, result: CallResult) {
        self.total += 1;
        if result.ok {
            self.successes += 1;
        }
        self.latencies_ms.push(result.elapsed_ms);
    }

    /// Number of calls recorded.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of 2xx calls recorded.
    pub fn successes(&self) -> usize {
        self.successes
    }

    /// Every latency sample, in completion order.
    pub fn latencies_ms(&self) -> &[f64] {
        &self.latencies_ms
    }

    /// Successes over total, `0.0` when nothing was recorded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }

    /// 95th percentile latency in milliseconds.
    pub fn p95_ms(&self) -> f64 {
        percentile(&self.latencies_ms, 0.95)
    }

    /// Mean latency in milliseconds, `0.0` when nothing was recorded.
    pub fn mean_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            0.0
        } else {
            self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
        }
    }
}
