//! Register, soak and verify phases.
//!
//! Each phase spawns one task per relay call into a `JoinSet`. A semaphore
//! caps how many calls are in flight at once; results are drained in
//! completion order by the phase itself, so the accumulators are never
//! shared across tasks.

use crate::config::DriverConfig;
use crate::control_plane::{CallResult, ControlPlane, HeartbeatRequest, RegisterRequest};
use crate::relay::{relays_for_run, run_token, RelayIdentity};
use crate::slo::{evaluate, RunMeasurements, SloThresholds, SloViolation};
use crate::stats::PhaseStats;
use crate::summary::RunSummary;
use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Inclusive bounds of the heartbeat `load_pct` value.
pub const LOAD_PCT_RANGE: (u32, u32) = (5, 90);

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Raw measurements.
    pub measurements: RunMeasurements,
    /// Rounded summary for output.
    pub summary: RunSummary,
    /// Failed objectives in priority order (empty when the run passed).
    pub violations: Vec<SloViolation>,
}

impl RunOutcome {
    /// True when every objective was met.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Process exit code: 0 on pass, 1 on any violation.
    pub fn exit_code(&self) -> u8 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// Drives one load run against a control plane.
pub struct SoakRunner {
    config: DriverConfig,
    control_plane: Arc<dyn ControlPlane>,
}

impl std::fmt::Debug for SoakRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoakRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SoakRunner {
    /// Create a runner. `config` is expected to be validated.
    pub fn new(config: DriverConfig, control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            config,
            control_plane,
        }
    }

    /// Get the driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run every phase with a fresh run token and evaluate the objectives.
    pub async fn run(&self) -> RunOutcome {
        let token = run_token();
        let relays = relays_for_run(&token, self.config.relay_count);
        self.run_with_relays(&relays).await
    }

    /// Run every phase for a fixed set of relays.
    pub async fn run_with_relays(&self, relays: &[RelayIdentity]) -> RunOutcome {
        tracing::info!(
            "Starting run: {} relays against {} ({} workers)",
            relays.len(),
            self.config.master_url,
            self.config.workers
        );

        let register = self.register_phase(relays).await;
        let (heartbeat, waves) = self.soak_phase(relays).await;
        let missing = self.missing_relays(relays).await;

        let measurements = RunMeasurements {
            relay_count: relays.len(),
            register,
            heartbeat,
            waves,
            missing,
        };
        let summary = RunSummary::from_measurements(&measurements);
        let violations = evaluate(&measurements, &SloThresholds::from(&self.config));

        if violations.is_empty() {
            tracing::info!("Run passed all objectives");
        } else {
            tracing::info!("Run failed {} objective(s)", violations.len());
        }

        RunOutcome {
            measurements,
            summary,
            violations,
        }
    }

    /// Register every relay once.
    pub async fn register_phase(&self, relays: &[RelayIdentity]) -> PhaseStats {
        let started = Instant::now();
        let mut stats = PhaseStats::default();

        let calls = relays.iter().map(|relay| {
            let control_plane = Arc::clone(&self.control_plane);
            let request = RegisterRequest::synthetic(relay.id(), relay.endpoint());
            async move { control_plane.register(request).await }
        });
        self.fan_out(calls, &mut stats).await;

        tracing::info!(
            "Register phase: {}/{} ok in {:?} (p95 {:.2}ms)",
            stats.successes(),
            relays.len(),
            started.elapsed(),
            stats.p95_ms()
        );
        stats
    }

    /// Send one heartbeat per relay, adding the results to `stats`.
    pub async fn heartbeat_wave(&self, relays: &[RelayIdentity], stats: &mut PhaseStats) {
        let loads: Vec<f64> = {
            let mut rng = rand::thread_rng();
            relays
                .iter()
                .map(|_| f64::from(rng.gen_range(LOAD_PCT_RANGE.0..=LOAD_PCT_RANGE.1)))
                .collect()
        };

        let calls = relays.iter().zip(loads).map(|(relay, load_pct)| {
            let control_plane = Arc::clone(&self.control_plane);
            let request = HeartbeatRequest {
                relay_id: relay.id().to_string(),
                load_pct,
            };
            async move { control_plane.heartbeat(request).await }
        });
        self.fan_out(calls, stats).await;
    }

    /// Repeat heartbeat waves until the soak duration has elapsed.
    ///
    /// After each wave the runner sleeps for whatever is left of the
    /// interval. A wave that overruns the interval is followed immediately
    /// by the next one; the overrun is not made up later.
    ///
    /// Returns the accumulated stats and the number of waves.
    pub async fn soak_phase(&self, relays: &[RelayIdentity]) -> (PhaseStats, usize) {
        let soak = self.config.soak_duration();
        let interval = self.config.interval();
        let mut stats = PhaseStats::default();
        let mut waves = 0;

        let start = Instant::now();
        while start.elapsed() < soak {
            let wave_start = Instant::now();
            self.heartbeat_wave(relays, &mut stats).await;
            waves += 1;

            let elapsed = wave_start.elapsed();
            tracing::debug!("Heartbeat wave {} finished in {:?}", waves, elapsed);
            if let Some(rest) = interval.checked_sub(elapsed) {
                if !rest.is_zero() {
                    tokio::time::sleep(rest).await;
                }
            }
        }

        tracing::info!(
            "Soak phase: {} waves, {}/{} heartbeats ok (p95 {:.2}ms)",
            waves,
            stats.successes(),
            stats.total(),
            stats.p95_ms()
        );
        (stats, waves)
    }

    /// Relay ids from this run that the control plane no longer lists.
    ///
    /// A failed listing counts every relay as missing.
    pub async fn missing_relays(&self, relays: &[RelayIdentity]) -> Vec<String> {
        match self.control_plane.list_relays().await {
            Ok(entries) => {
                let missing = missing_from_listing(relays, &entries);
                tracing::info!(
                    "Post-soak listing: {} entries, {} run relays missing",
                    entries.len(),
                    missing.len()
                );
                missing
            }
            Err(e) => {
                tracing::warn!("Post-soak listing failed: {}", e);
                relays.iter().map(|r| r.id().to_string()).collect()
            }
        }
    }

    /// Run `calls` with at most `workers` in flight, recording each result as
    /// it completes.
    async fn fan_out<I, F>(&self, calls: I, stats: &mut PhaseStats)
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = CallResult> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();

        for call in calls {
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // the semaphore is never closed, so acquire cannot fail
                let _permit = permits.acquire_owned().await;
                call.await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => stats.record(result),
                Err(e) => {
                    tracing::warn!("Call task did not complete: {}", e);
                    stats.record(CallResult::transport_failure(0.0));
                }
            }
        }
    }
}

/// Relay ids present in a listing.
///
/// Entries that are not objects, or lack a string `relay_id`, are ignored.
pub fn presence_set(entries: &[serde_json::Value]) -> HashSet<&str> {
    entries
        .iter()
        .filter_map(|entry| entry.as_object())
        .filter_map(|obj| obj.get("relay_id"))
        .filter_map(|id| id.as_str())
        .collect()
}

/// Run relay ids absent from a listing, in run order.
pub fn missing_from_listing(
    relays: &[RelayIdentity],
    entries: &[serde_json::Value],
) -> Vec<String> {
    let present = presence_set(entries);
    relays
        .iter()
        .filter(|relay| !present.contains(relay.id()))
        .map(|relay| relay.id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::MockControlPlane;
    use serde_json::json;

    fn config(relay_count: usize, soak_seconds: u64, interval_seconds: f64) -> DriverConfig {
        DriverConfig {
            master_url: "http://mock".into(),
            relay_count,
            soak_seconds,
            interval_seconds,
            workers: 4,
            ..DriverConfig::default()
        }
    }

    fn runner(config: DriverConfig, mock: &MockControlPlane) -> SoakRunner {
        SoakRunner::new(config, Arc::new(mock.clone()))
    }

    #[test]
    fn presence_ignores_malformed_entries() {
        let entries = vec![
            json!({ "relay_id": "a", "region": "x" }),
            json!("b"),
            json!(42),
            json!({ "relay_id": 7 }),
            json!({ "id": "c" }),
            json!({ "relay_id": "d" }),
        ];
        let present = presence_set(&entries);
        assert_eq!(present, ["a", "d"].into_iter().collect());
    }

    #[test]
    fn missing_keeps_run_order() {
        let relays = relays_for_run("t", 4);
        let entries = vec![json!({ "relay_id": "load-t-001" }), json!({ "relay_id": "other" })];
        assert_eq!(
            missing_from_listing(&relays, &entries),
            vec!["load-t-000", "load-t-002", "load-t-003"]
        );
    }

    #[tokio::test]
    async fn register_phase_aggregates_scripted_results() {
        let mock = MockControlPlane::new();
        mock.script_registers([
            CallResult::from_status(200, 10.0),
            CallResult::from_status(500, 50.0),
            CallResult::transport_failure(3000.0),
            CallResult::from_status(201, 20.0),
        ]);
        let relays = relays_for_run("t", 4);

        let stats = runner(config(4, 1, 1.0), &mock).register_phase(&relays).await;

        assert_eq!(stats.total(), 4);
        assert_eq!(stats.successes(), 2);
        // completion order is not fixed, only the multiset of samples
        let mut samples = stats.latencies_ms().to_vec();
        samples.sort_by(f64::total_cmp);
        assert_eq!(samples, vec![10.0, 20.0, 50.0, 3000.0]);
        assert_eq!(stats.p95_ms(), 50.0);
    }

    #[tokio::test]
    async fn register_payload_matches_relay() {
        let mock = MockControlPlane::new();
        let relays = relays_for_run("t", 3);

        runner(config(3, 1, 1.0), &mock).register_phase(&relays).await;

        let mut sent = mock.registrations();
        sent.sort_by(|a, b| a.relay_id.cmp(&b.relay_id));
        assert_eq!(sent.len(), 3);
        for (request, relay) in sent.iter().zip(&relays) {
            assert_eq!(request.relay_id, relay.id());
            assert_eq!(request.endpoints, vec![relay.endpoint()]);
        }
    }

    #[tokio::test]
    async fn heartbeat_wave_covers_every_relay() {
        let mock = MockControlPlane::new();
        let relays = relays_for_run("t", 10);
        let mut stats = PhaseStats::default();

        runner(config(10, 1, 1.0), &mock)
            .heartbeat_wave(&relays, &mut stats)
            .await;

        assert_eq!(stats.total(), 10);
        let beats = mock.heartbeats();
        let ids: HashSet<String> = beats.iter().map(|b| b.relay_id.clone()).collect();
        assert_eq!(ids.len(), 10);
        for beat in &beats {
            assert!((5.0..=90.0).contains(&beat.load_pct));
            assert_eq!(beat.load_pct.fract(), 0.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn soak_runs_one_wave_per_interval() {
        let mock = MockControlPlane::new();
        let relays = relays_for_run("t", 4);

        let (stats, waves) = runner(config(4, 3, 1.0), &mock).soak_phase(&relays).await;

        // waves start at t=0s, 1s and 2s
        assert_eq!(waves, 3);
        assert_eq!(stats.total(), 12);
        assert_eq!(stats.success_rate(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn soak_with_short_interval_runs_more_waves() {
        let mock = MockControlPlane::new();
        let relays = relays_for_run("t", 2);

        let (_, waves) = runner(config(2, 1, 0.25), &mock).soak_phase(&relays).await;

        assert_eq!(waves, 4);
    }

    #[tokio::test]
    async fn failed_listing_counts_everything_missing() {
        let mock = MockControlPlane::new();
        mock.fail_listing(500);
        let relays = relays_for_run("t", 3);

        let missing = runner(config(3, 1, 1.0), &mock)
            .missing_relays(&relays)
            .await;

        assert_eq!(missing.len(), 3);
        assert_eq!(mock.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_passes_against_healthy_mock() {
        let mock = MockControlPlane::new();
        let relays = relays_for_run("t", 5);

        let outcome = runner(config(5, 2, 1.0), &mock)
            .run_with_relays(&relays)
            .await;

        assert!(outcome.passed());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.summary.relay_count, 5);
        assert_eq!(outcome.summary.register_success_rate, 1.0);
        assert_eq!(outcome.summary.heartbeat_success_rate, 1.0);
        assert_eq!(outcome.summary.heartbeat_total, 10);
        assert_eq!(outcome.summary.missing_registered_relays, 0);
        assert_eq!(outcome.measurements.waves, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_registers_fail_run() {
        let mock = MockControlPlane::new();
        mock.set_register_default(CallResult::from_status(500, 5.0));
        mock.set_listing(Vec::new());
        let relays = relays_for_run("t", 5);

        let outcome = runner(config(5, 2, 1.0), &mock)
            .run_with_relays(&relays)
            .await;

        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.summary.register_success_rate, 0.0);
        assert!(matches!(
            outcome.violations[0],
            SloViolation::RegisterSuccessRate { .. }
        ));
        assert!(matches!(
            outcome.violations.last(),
            Some(SloViolation::MissingRelays { count: 5, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_heartbeat_failures_reflected_in_rate() {
        let mock = MockControlPlane::new();
        // one failure out of 10 heartbeats (5 relays x 2 waves)
        mock.script_heartbeats([CallResult::from_status(503, 2.0)]);
        let relays = relays_for_run("t", 5);

        let outcome = runner(config(5, 2, 1.0), &mock)
            .run_with_relays(&relays)
            .await;

        assert_eq!(outcome.summary.heartbeat_total, 10);
        assert_eq!(outcome.summary.heartbeat_success_rate, 0.9);
        assert_eq!(
            outcome.violations,
            vec![SloViolation::HeartbeatSuccessRate {
                actual: 0.9,
                threshold: 0.98
            }]
        );
    }

    #[test]
    fn exit_codes() {
        let outcome = RunOutcome {
            measurements: RunMeasurements::default(),
            summary: RunSummary::from_measurements(&RunMeasurements::default()),
            violations: vec![SloViolation::MissingRelays {
                count: 1,
                example: "x".into(),
            }],
        };
        assert!(!outcome.passed());
        assert_eq!(outcome.exit_code(), 1);
    }
}
