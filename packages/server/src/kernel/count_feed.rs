//! In-process pub/sub feed for remaining-seat-count updates.
//!
//! Producers (the booking engine) publish the latest remaining count after
//! every committed booking or cancellation; consumers (the SSE endpoint)
//! forward each value to connected viewers. Messages are idempotent
//! "latest known value" snapshots, never deltas, so a lagged receiver can
//! simply pick up the next one.

use tokio::sync::broadcast;

/// Thread-safe, cloneable broadcast feed of remaining-seat counts.
#[derive(Clone)]
pub struct CountFeed {
    tx: broadcast::Sender<i64>,
}

impl CountFeed {
    /// Create a feed with default capacity (64 buffered counts).
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish the latest remaining count. No-op if nobody is listening.
    pub fn publish(&self, remaining: i64) {
        // Ignore send errors (no active receivers)
        let _ = self.tx.send(remaining);
    }

    /// Subscribe to count updates.
    pub fn subscribe(&self) -> broadcast::Receiver<i64> {
        self.tx.subscribe()
    }
}

impl Default for CountFeed {
    fn default() -> Self {
        Self::new()
    }
}
