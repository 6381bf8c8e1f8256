//! Start-up failures of the tcp-chaos-proxy binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::time::Duration;

fn proxy() -> Command {
    let mut cmd = Command::cargo_bin("tcp-chaos-proxy").unwrap();
    cmd.env("RUST_LOG", "warn").timeout(Duration::from_secs(10));
    cmd
}

#[test]
fn missing_target_port_fails() {
    proxy()
        .args(["--listen-port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("target_port is required"));
}

#[test]
fn zero_target_port_fails() {
    proxy()
        .args(["--listen-port", "0", "--target-port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid target_port"));
}

#[test]
fn negative_delay_rejected_by_parser() {
    proxy()
        .args(["--listen-port", "0", "--target-port", "80", "--delay-ms", "-5"])
        .assert()
        .failure();
}

#[test]
fn unreadable_config_file_fails() {
    proxy()
        .args(["--config", "/nonexistent/proxy.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn busy_listen_port_fails() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    proxy()
        .args(["--listen-port", &port, "--target-port", "80"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to bind"));
}

#[test]
fn config_file_ports_are_used() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proxy.toml");
    std::fs::write(&path, format!("listen_port = {port}\ntarget_port = 80\n")).unwrap();

    // the file's listen port is taken, which proves it was read
    proxy()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains(format!("127.0.0.1:{port}")));
}
