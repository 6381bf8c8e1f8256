//! control-plane-load-driver binary entry point.
//!
//! Usage:
//! ```bash
//! control-plane-load-driver --master-url http://127.0.0.1:8080
//! control-plane-load-driver --config soak.toml --relay-count 100 --soak-seconds 60
//! ```
//!
//! Exit codes: 0 all objectives met, 1 objective violated, 2 invalid
//! configuration, 130 interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use soak_driver::{http_runner, write_summary, ConfigOverrides, DriverConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

/// Synthetic load and soak driver for the relay control plane.
#[derive(Parser, Debug)]
#[command(name = "control-plane-load-driver")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file with driver settings (flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control-plane base URL, e.g. http://127.0.0.1:8080
    #[arg(long)]
    master_url: Option<String>,

    /// Number of synthetic relays [default: 30]
    #[arg(long)]
    relay_count: Option<usize>,

    /// Heartbeat soak duration in seconds [default: 25]
    #[arg(long)]
    soak_seconds: Option<u64>,

    /// Target interval between heartbeat waves in seconds [default: 1.0]
    #[arg(long)]
    interval_seconds: Option<f64>,

    /// Per-call timeout in seconds [default: 3.0]
    #[arg(long)]
    timeout_seconds: Option<f64>,

    /// Maximum calls in flight [default: 16]
    #[arg(long)]
    workers: Option<usize>,

    /// Minimum success rate for both phases [default: 0.98]
    #[arg(long)]
    min_success_rate: Option<f64>,

    /// Maximum register p95 latency in ms [default: 400]
    #[arg(long)]
    max_register_p95_ms: Option<f64>,

    /// Maximum heartbeat p95 latency in ms [default: 450]
    #[arg(long)]
    max_heartbeat_p95_ms: Option<f64>,

    /// Also write the summary JSON to this file
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            master_url: self.master_url.clone(),
            relay_count: self.relay_count,
            soak_seconds: self.soak_seconds,
            interval_seconds: self.interval_seconds,
            timeout_seconds: self.timeout_seconds,
            workers: self.workers,
            min_success_rate: self.min_success_rate,
            max_register_p95_ms: self.max_register_p95_ms,
            max_heartbeat_p95_ms: self.max_heartbeat_p95_ms,
        }
    }

    fn load_config(&self) -> Result<DriverConfig> {
        let config = soak_driver::load_config(self.config.as_deref(), self.overrides())
            .context("invalid driver configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };

    tokio::select! {
        result = run(config, cli.summary_out) => match result {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, abandoning in-flight calls");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run(config: DriverConfig, summary_out: Option<PathBuf>) -> Result<u8> {
    let runner = http_runner(config)?;
    let outcome = runner.run().await;

    let json = outcome
        .summary
        .to_json_pretty()
        .context("failed to encode summary")?;
    println!("{json}");

    for violation in &outcome.violations {
        eprintln!("{violation}");
    }

    // the exit code reports the objectives only
    if let Some(path) = summary_out {
        if let Err(e) = write_summary(&outcome.summary, &path) {
            tracing::error!("{}", e);
        }
    }

    Ok(outcome.exit_code())
}
