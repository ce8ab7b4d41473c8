//! Client-side interval counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Live counters for one client instance. All increments are relaxed; the
/// counters are observability, not control flow.
#[derive(Debug, Default)]
pub struct ClientStats {
    /// Requests written to the stream.
    pub sent: AtomicU64,
    /// Requests resolved with a response.
    pub completed: AtomicU64,
    /// Requests that hit their deadline.
    pub timeouts: AtomicU64,
    /// Requests force-resolved by a disconnect.
    pub drained: AtomicU64,
    /// Responses whose ID matched no tracked entry.
    pub unmatched: AtomicU64,
    /// Sends that found the outbound queue full and had to wait.
    pub backpressure: AtomicU64,
}

/// Point-in-time copy of [`ClientStats`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatsSnapshot {
    pub sent: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub drained: u64,
    pub unmatched: u64,
    pub backpressure: u64,
}

impl ClientStats {
    pub fn snapshot(&self) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            backpressure: self.backpressure.load(Ordering::Relaxed),
        }
    }

    /// Emit one structured stats line.
    pub fn log(&self, pending: usize) {
        let s = self.snapshot();
        info!(
            sent = s.sent,
            completed = s.completed,
            timeouts = s.timeouts,
            drained = s.drained,
            unmatched = s.unmatched,
            backpressure = s.backpressure,
            pending = pending,
            "IPC client stats"
        );
    }
}
