//! One-way byte forwarding.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read chunk size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Which half of a session a pipe serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    /// Client to upstream.
    ClientToUpstream,
    /// Upstream to client.
    UpstreamToClient,
}

impl fmt::Display for PipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToUpstream => f.write_str("client->upstream"),
            Self::UpstreamToClient => f.write_str("upstream->client"),
        }
    }
}

/// Copy bytes from `source` to `sink` until EOF or the first I/O error.
///
/// Every chunk written to the sink is added to `forwarded` as it goes, so the
/// count stays accurate if the future is dropped part way. The sink is shut
/// down on exit, errors ignored.
pub async fn pipe<R, W>(
    mut source: R,
    mut sink: W,
    seq: u64,
    direction: PipeDirection,
    forwarded: &AtomicU64,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        match source.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!(seq, %direction, "EOF");
                break;
            }
            Ok(n) => {
                if let Err(e) = sink.write_all(&buf[..n]).await {
                    tracing::debug!(seq, %direction, error = %e, "write error");
                    break;
                }
                forwarded.fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::debug!(seq, %direction, error = %e, "read error");
                break;
            }
        }
    }

    let _ = sink.shutdown().await;
}
