//! Accept loop and per-connection sessions.

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::fault::{should_drop, ConnectionSequencer};
use crate::metrics::ProxyMetrics;
use crate::pipe::{pipe, PipeDirection};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// How long the surviving direction may keep running once the other one
/// has ended. After this both sockets are closed.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared by the accept loop and every session.
#[derive(Debug)]
struct Shared {
    config: ProxyConfig,
    target: String,
    metrics: Arc<ProxyMetrics>,
}

/// A bound chaos proxy.
#[derive(Debug)]
pub struct ChaosProxy {
    listener: TcpListener,
    sequencer: ConnectionSequencer,
    shared: Arc<Shared>,
}

impl ChaosProxy {
    /// Bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Bind`] if the address cannot be bound.
    pub async fn bind(config: ProxyConfig) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;

        Ok(Self {
            listener,
            sequencer: ConnectionSequencer::new(),
            shared: Arc::new(Shared {
                target: config.target_addr(),
                config,
                metrics: Arc::new(ProxyMetrics::default()),
            }),
        })
    }

    /// Address actually bound, useful with an ephemeral listen port.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The proxy configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.shared.config
    }

    /// Handle to the counters; stays valid after the proxy stops.
    pub fn metrics(&self) -> Arc<ProxyMetrics> {
        self.shared.metrics.clone()
    }

    /// Serve forever.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes. In-flight sessions keep running.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let seq = self.sequencer.next();
                        ProxyMetrics::incr(&self.shared.metrics.connections_accepted);
                        tracing::debug!(seq, %peer, "accepted");
                        let session = ProxySession { seq, peer, client: stream };
                        tokio::spawn(session.run(self.shared.clone()));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
    }
}

/// One accepted client connection.
#[derive(Debug)]
struct ProxySession {
    seq: u64,
    peer: SocketAddr,
    client: TcpStream,
}

impl ProxySession {
    async fn run(self, shared: Arc<Shared>) {
        let Self {
            seq,
            peer,
            mut client,
        } = self;
        let metrics = &shared.metrics;

        if should_drop(seq, shared.config.drop_every) {
            ProxyMetrics::incr(&metrics.connections_dropped);
            tracing::debug!(seq, %peer, "dropping connection");
            let _ = client.shutdown().await;
            return;
        }

        if let Some(delay) = shared.config.delay() {
            tokio::time::sleep(delay).await;
        }

        let upstream = match TcpStream::connect(&shared.target).await {
            Ok(stream) => stream,
            Err(e) => {
                ProxyMetrics::incr(&metrics.upstream_dial_failures);
                tracing::debug!(seq, target = %shared.target, error = %e, "upstream dial failed");
                return;
            }
        };

        let (client_read, client_write) = client.into_split();
        let (upstream_read, upstream_write) = upstream.into_split();

        let up = pipe(
            client_read,
            upstream_write,
            seq,
            PipeDirection::ClientToUpstream,
            &metrics.bytes_client_to_upstream,
        );
        let down = pipe(
            upstream_read,
            client_write,
            seq,
            PipeDirection::UpstreamToClient,
            &metrics.bytes_upstream_to_client,
        );
        tokio::pin!(up, down);

        let ended = tokio::select! {
            _ = &mut up => PipeDirection::ClientToUpstream,
            _ = &mut down => PipeDirection::UpstreamToClient,
        };
        let drained = match ended {
            PipeDirection::ClientToUpstream => tokio::time::timeout(DRAIN_TIMEOUT, &mut down).await,
            PipeDirection::UpstreamToClient => tokio::time::timeout(DRAIN_TIMEOUT, &mut up).await,
        };
        if drained.is_err() {
            tracing::debug!(seq, %ended, "other direction still open after drain, closing");
        }

        ProxyMetrics::incr(&metrics.sessions_completed);
        tracing::debug!(seq, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let proxy = ChaosProxy::bind(ProxyConfig::new(0, 9)).await.unwrap();
        let addr = proxy.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(proxy.config().target_addr(), "127.0.0.1:9");
        assert_eq!(proxy.metrics().snapshot().connections_accepted, 0);
    }

    #[tokio::test]
    async fn bind_conflict_reports_address() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = ChaosProxy::bind(ProxyConfig::new(port, 9)).await.unwrap_err();
        match err {
            ProxyError::Bind { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_until_returns_on_shutdown() {
        let proxy = ChaosProxy::bind(ProxyConfig::new(0, 9)).await.unwrap();
        proxy.run_until(async {}).await;
    }
}
