//! Deterministic fault selection.

use std::sync::atomic::{AtomicU64, Ordering};

/// Whether the connection with 1-based sequence number `seq` is dropped.
///
/// `drop_every == 0` disables dropping. Otherwise every multiple of
/// `drop_every` is dropped, so `drop_every == 1` drops everything.
pub fn should_drop(seq: u64, drop_every: u64) -> bool {
    drop_every > 0 && seq % drop_every == 0
}

/// Hands out connection sequence numbers starting at 1.
#[derive(Debug, Default)]
pub struct ConnectionSequencer {
    issued: AtomicU64,
}

impl ConnectionSequencer {
    /// Create a sequencer whose first number is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number. Unique across threads.
    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// How many numbers have been issued.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}
