//! Process-lifetime proxy counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for the proxy.
///
/// All counters are monotonically increasing and live as long as the process.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    /// Connections accepted, dropped ones included.
    pub connections_accepted: AtomicU64,
    /// Connections closed by the drop rule.
    pub connections_dropped: AtomicU64,
    /// Sessions abandoned because the upstream dial failed.
    pub upstream_dial_failures: AtomicU64,
    /// Forwarded sessions that have closed.
    pub sessions_completed: AtomicU64,
    /// Bytes forwarded from clients to the upstream.
    pub bytes_client_to_upstream: AtomicU64,
    /// Bytes forwarded from the upstream to clients.
    pub bytes_upstream_to_client: AtomicU64,
}

/// Point-in-time copy of [`ProxyMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// See [`ProxyMetrics::connections_accepted`].
    pub connections_accepted: u64,
    /// See [`ProxyMetrics::connections_dropped`].
    pub connections_dropped: u64,
    /// See [`ProxyMetrics::upstream_dial_failures`].
    pub upstream_dial_failures: u64,
    /// See [`ProxyMetrics::sessions_completed`].
    pub sessions_completed: u64,
    /// See [`ProxyMetrics::bytes_client_to_upstream`].
    pub bytes_client_to_upstream: u64,
    /// See [`ProxyMetrics::bytes_upstream_to_client`].
    pub bytes_upstream_to_client: u64,
}

impl ProxyMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_dropped: self.connections_dropped.load(Ordering::Relaxed),
            upstream_dial_failures: self.upstream_dial_failures.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            bytes_client_to_upstream: self.bytes_client_to_upstream.load(Ordering::Relaxed),
            bytes_upstream_to_client: self.bytes_upstream_to_client.load(Ordering::Relaxed),
        }
    }
}
