//! End-to-end runs of the driver library against a stub control plane.

mod common;

use axum::http::StatusCode;
use common::StubControlPlane;
use soak_driver::{http_runner, DriverConfig, SloViolation};

fn config(master_url: String) -> DriverConfig {
    DriverConfig {
        master_url,
        relay_count: 5,
        soak_seconds: 2,
        interval_seconds: 1.0,
        timeout_seconds: 2.0,
        workers: 4,
        // loopback latency is tiny, keep the latency objectives out of the way
        max_register_p95_ms: 5_000.0,
        max_heartbeat_p95_ms: 5_000.0,
        ..DriverConfig::default()
    }
    .validate()
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accepting_control_plane_passes() {
    let stub = StubControlPlane::accepting();
    let addr = stub.clone().spawn().await;

    let outcome = http_runner(config(format!("http://{addr}")))
        .unwrap()
        .run()
        .await;

    assert!(outcome.passed(), "violations: {:?}", outcome.violations);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.summary.relay_count, 5);
    assert_eq!(outcome.summary.register_success_rate, 1.0);
    assert_eq!(outcome.summary.heartbeat_success_rate, 1.0);
    assert_eq!(outcome.summary.missing_registered_relays, 0);
    // two waves over a 2s soak with a 1s interval
    assert_eq!(outcome.summary.heartbeat_total, 10);
    assert_eq!(stub.heartbeat_count(), 10);
    assert_eq!(stub.registered().len(), 5);
    assert!(outcome.summary.register_p95_ms > 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejecting_registers_fails_run() {
    let stub = StubControlPlane::new(StatusCode::INTERNAL_SERVER_ERROR);
    let addr = stub.clone().spawn().await;

    let outcome = http_runner(config(format!("http://{addr}")))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.summary.register_success_rate, 0.0);
    assert_eq!(outcome.summary.heartbeat_success_rate, 1.0);
    assert_eq!(outcome.summary.missing_registered_relays, 5);
    assert!(matches!(
        outcome.violations[0],
        SloViolation::RegisterSuccessRate { .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_control_plane_records_transport_failures() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = config(format!("http://{addr}"));
    config.soak_seconds = 1;
    let outcome = http_runner(config).unwrap().run().await;

    assert_eq!(outcome.summary.register_success_rate, 0.0);
    assert_eq!(outcome.summary.heartbeat_success_rate, 0.0);
    assert_eq!(outcome.summary.heartbeat_total, 5);
    // the listing fails too, so every relay counts as missing
    assert_eq!(outcome.summary.missing_registered_relays, 5);
    assert_eq!(outcome.violations.len(), 3);
}
