//! Request correlation table.
//!
//! Owns every in-flight request for one client instance. Entries are keyed
//! by correlation ID and resolved by ID only, never by issue order.
//!
//! Lifecycle of one entry:
//!
//! ```text
//! register ──► Pending ──resolve──► removed (resolver fired with response)
//!                 │
//!                 └─deadline──► Expired (resolver fired with Timeout)
//!                                  │
//!                     late resolve │ absorbed silently
//!                                  │
//!                                  └─grace elapsed──► removed
//! ```
//!
//! A disconnect drains every still-Pending entry with a disconnect signal
//! and clears the table in one pass.

use crate::config::ExpiryStrategy;
use crate::error::{ClientError, Outcome};
use crate::stats::ClientStats;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Expired,
}

struct PendingEntry {
    /// Single-assignment result cell; `None` once the resolver has fired.
    tx: Option<oneshot::Sender<Outcome>>,
    state: EntryState,
    uri: String,
    deadline: Instant,
    /// Set when the entry transitions to Expired; sweep mode purges by it.
    purge_at: Option<Instant>,
    /// Per-request deadline/grace timer, absent in sweep mode.
    timer: Option<JoinHandle<()>>,
}

/// Correlation table for one client instance.
pub struct RequestTracker {
    entries: DashMap<String, PendingEntry>,
    serial: AtomicU64,
    grace: Duration,
    per_request_timers: bool,
    stats: Arc<ClientStats>,
}

impl RequestTracker {
    pub fn new(grace: Duration, expiry: &ExpiryStrategy, stats: Arc<ClientStats>) -> Self {
        Self {
            entries: DashMap::new(),
            serial: AtomicU64::new(0),
            grace,
            per_request_timers: matches!(expiry, ExpiryStrategy::PerRequestTimer),
            stats,
        }
    }

    /// Next correlation ID. Process-local monotonic; IDs are unique among
    /// currently tracked entries (and, practically, for the process lifetime).
    pub fn allocate(&self) -> String {
        format!("rq{}", self.serial.fetch_add(1, Ordering::Relaxed))
    }

    /// Store a Pending entry and start its deadline timer. Returns the
    /// receiver half of the single-assignment result cell.
    pub fn register(
        self: &Arc<Self>,
        id: String,
        uri: String,
        timeout: Duration,
    ) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            tx: Some(tx),
            state: EntryState::Pending,
            uri,
            deadline: Instant::now() + timeout,
            purge_at: None,
            timer: None,
        };
        self.entries.insert(id.clone(), entry);

        if self.per_request_timers {
            let tracker = Arc::clone(self);
            let grace = self.grace;
            let timer_id = id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if tracker.expire(&timer_id) {
                    tokio::time::sleep(grace).await;
                    tracker.purge(&timer_id);
                }
            });
            if let Some(mut entry) = self.entries.get_mut(&id) {
                entry.timer = Some(handle);
            } else {
                // Entry resolved before we could record the handle.
                handle.abort();
            }
        }

        rx
    }

    /// Resolve a tracked entry.
    ///
    /// Pending: remove and fire the resolver exactly once. Expired
    /// (grace-retained): discard silently, the resolver already fired with a
    /// timeout. Unknown: log an unmatched-response diagnostic and drop.
    pub fn resolve(&self, id: &str, outcome: Outcome) {
        if let Some((_, mut entry)) = self
            .entries
            .remove_if(id, |_, e| e.state == EntryState::Pending)
        {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            if let Some(tx) = entry.tx.take() {
                // Counts responses that actually arrived, hoisted errors
                // included; internally synthesized failures don't.
                if matches!(outcome, Ok(_) | Err(ClientError::Remote(_))) {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                let _ = tx.send(outcome);
            }
        } else if self.entries.contains_key(id) {
            debug!(id, "late response absorbed within grace window");
        } else {
            self.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            error!(
                code = "ipc_req_not_found",
                id, "could not find request ID in request list"
            );
        }
    }

    /// Deadline fired for `id`: mark Pending→Expired and invoke the resolver
    /// with a timeout signal. The entry is retained so a straggling response
    /// within the grace window is absorbed, not double-delivered.
    ///
    /// Returns true when the entry was Pending (the caller owns the grace
    /// countdown in per-request-timer mode).
    fn expire(&self, id: &str) -> bool {
        let mut fired = false;
        if let Some(mut entry) = self.entries.get_mut(id) {
            if entry.state == EntryState::Pending {
                entry.state = EntryState::Expired;
                entry.purge_at = Some(Instant::now() + self.grace);
                let uri = entry.uri.clone();
                if let Some(tx) = entry.tx.take() {
                    let _ = tx.send(Err(ClientError::Timeout { uri: uri.clone() }));
                }
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                error!(code = "request_timeout", id, uri = %uri, "IPC request expired");
                fired = true;
            }
        }
        fired
    }

    /// Grace window over: delete the entry unconditionally. Any response for
    /// this ID from now on is an orphan and gets dropped as unmatched.
    fn purge(&self, id: &str) {
        if self.entries.remove(id).is_some() {
            debug!(id, "expired request purged");
        }
    }

    /// Invoked once per disconnect: fire every still-Pending resolver with
    /// the disconnect signal and clear the table, grace-retained entries
    /// included.
    pub fn drain_all(&self) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut drained = 0u64;
        for id in ids {
            if let Some((_, mut entry)) = self.entries.remove(&id) {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                if entry.state == EntryState::Pending {
                    if let Some(tx) = entry.tx.take() {
                        let _ = tx.send(Err(ClientError::Disconnected));
                        drained += 1;
                    }
                }
            }
        }
        if drained > 0 {
            self.stats.drained.fetch_add(drained, Ordering::Relaxed);
            debug!(drained, "pending requests drained on disconnect");
        }
    }

    /// One pass of the sweep strategy: expire overdue Pending entries and
    /// purge Expired entries whose grace window has elapsed. Returns the
    /// number purged.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut to_expire = Vec::new();
        let mut to_purge = Vec::new();
        for entry in self.entries.iter() {
            match entry.state {
                EntryState::Pending if entry.deadline <= now => {
                    to_expire.push(entry.key().clone());
                }
                EntryState::Expired if entry.purge_at.is_some_and(|t| t <= now) => {
                    to_purge.push(entry.key().clone());
                }
                _ => {}
            }
        }
        for id in &to_expire {
            self.expire(id);
        }
        for id in &to_purge {
            self.purge(id);
        }
        to_purge.len()
    }

    /// Background sweeper for [`ExpiryStrategy::Sweep`].
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration) {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let purged = self.sweep();
            if purged > 0 {
                debug!(purged, "purged expired request entries");
            }
        }
    }

    /// Number of currently tracked entries (Pending plus grace-retained).
    /// Returns to 0 once every grace window has elapsed.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}
