//! tcp-chaos-proxy binary entry point.
//!
//! Usage:
//! ```bash
//! tcp-chaos-proxy --listen-port 9000 --target-port 8080 --drop-every 5
//! tcp-chaos-proxy --config proxy.toml --delay-ms 250
//! ```

use anyhow::{Context, Result};
use chaos_proxy::{ChaosProxy, PartialProxyConfig, ProxyConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// TCP proxy with deterministic connection drop and delay.
#[derive(Parser, Debug)]
#[command(name = "tcp-chaos-proxy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file with proxy settings (flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to listen on [default: 127.0.0.1]
    #[arg(long)]
    listen_host: Option<String>,

    /// Port to listen on (0 picks a free port)
    #[arg(long)]
    listen_port: Option<u16>,

    /// Upstream host [default: 127.0.0.1]
    #[arg(long)]
    target_host: Option<String>,

    /// Upstream port
    #[arg(long)]
    target_port: Option<u16>,

    /// Delay before dialing upstream, per connection [default: 0]
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Close every Nth accepted connection, 0 disables [default: 0]
    #[arg(long)]
    drop_every: Option<u64>,
}

impl Cli {
    fn load_config(&self) -> Result<ProxyConfig> {
        let flags = PartialProxyConfig {
            listen_host: self.listen_host.clone(),
            listen_port: self.listen_port,
            target_host: self.target_host.clone(),
            target_port: self.target_port,
            delay_ms: self.delay_ms,
            drop_every: self.drop_every,
        };
        let config = chaos_proxy::load_config(self.config.as_deref(), flags)
            .context("invalid proxy configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let proxy = ChaosProxy::bind(config).await?;
    let local = proxy.local_addr()?;
    let config = proxy.config();
    tracing::info!(
        listen = %local,
        target = %config.target_addr(),
        delay_ms = config.delay_ms,
        drop_every = config.drop_every,
        "chaos proxy listening"
    );

    let metrics = proxy.metrics();
    proxy
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let snapshot = metrics.snapshot();
    tracing::info!(
        accepted = snapshot.connections_accepted,
        dropped = snapshot.connections_dropped,
        dial_failures = snapshot.upstream_dial_failures,
        completed = snapshot.sessions_completed,
        bytes_up = snapshot.bytes_client_to_upstream,
        bytes_down = snapshot.bytes_upstream_to_client,
        "chaos proxy stopped"
    );
    Ok(())
}
