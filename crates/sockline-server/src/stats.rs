//! Interval stats: atomic counters cycled into reporting windows.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// One stats window merged with the live gauges.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Connections open right now.
    pub connections: u64,
    /// Registered URI handlers.
    pub handlers: u64,
    /// Window length in milliseconds.
    pub duration: u64,
    /// Requests received in the window.
    pub requests: u64,
    /// Connections opened in the window.
    pub client_open: u64,
    /// Connections closed in the window.
    pub client_close: u64,
    /// Highest concurrent connection count observed in the window.
    pub max_connections: u64,
    /// Responses whose handler ran past the slow threshold.
    pub slow_responses: u64,
    /// Outbound queue-full events in the window.
    pub backpressure_events: u64,
}

impl StatsReport {
    /// Emit the report as one structured log line.
    pub fn log(&self) {
        info!(
            connections = self.connections,
            handlers = self.handlers,
            duration_ms = self.duration,
            requests = self.requests,
            client_open = self.client_open,
            client_close = self.client_close,
            max_connections = self.max_connections,
            slow_responses = self.slow_responses,
            backpressure_events = self.backpressure_events,
            "IPC server stats"
        );
    }
}

/// Counter hub shared by the pool and the server facade.
///
/// Counters accumulate in the current window; `cycle` snapshots and resets
/// them and retains the snapshot as the last completed window, all under a
/// single mutex so a report never mixes two windows. Queries read that
/// retained window, not the half-filled live counters.
pub struct StatsAggregator {
    slow_threshold: Duration,
    requests: AtomicU64,
    client_open: AtomicU64,
    client_close: AtomicU64,
    max_connections: AtomicU64,
    slow_responses: AtomicU64,
    backpressure_events: AtomicU64,
    window: Mutex<Window>,
}

struct Window {
    started: Instant,
    last: StatsReport,
}

impl StatsAggregator {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            requests: AtomicU64::new(0),
            client_open: AtomicU64::new(0),
            client_close: AtomicU64::new(0),
            max_connections: AtomicU64::new(0),
            slow_responses: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
            window: Mutex::new(Window {
                started: Instant::now(),
                last: StatsReport::default(),
            }),
        }
    }

    /// `current_open` is the live connection count after this open; it feeds
    /// the window's high-water mark.
    pub fn connection_opened(&self, current_open: u64) {
        self.client_open.fetch_add(1, Ordering::Relaxed);
        self.max_connections.fetch_max(current_open, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.client_close.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_received(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished handler run; counts it slow when it exceeded the
    /// threshold.
    pub fn response_finished(&self, elapsed: Duration) {
        if elapsed > self.slow_threshold {
            self.slow_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn backpressure_event(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Last completed window merged with the live gauges. Queryable at any
    /// time; the counter fields stay put until the next [`cycle`].
    ///
    /// [`cycle`]: StatsAggregator::cycle
    pub fn get_stats(&self, connections: u64, handlers: u64) -> StatsReport {
        let mut report = self.window.lock().last.clone();
        report.connections = connections;
        report.handlers = handlers;
        report
    }

    /// Close out the current window: retain it as the last completed window,
    /// reset every counter, and return the report. The next window's
    /// high-water mark starts from `connections`.
    pub fn cycle(&self, connections: u64, handlers: u64) -> StatsReport {
        let mut window = self.window.lock();
        let duration = window.started.elapsed();
        window.started = Instant::now();
        let report = StatsReport {
            connections,
            handlers,
            duration: duration.as_millis() as u64,
            requests: self.requests.swap(0, Ordering::Relaxed),
            client_open: self.client_open.swap(0, Ordering::Relaxed),
            client_close: self.client_close.swap(0, Ordering::Relaxed),
            max_connections: self.max_connections.swap(connections, Ordering::Relaxed),
            slow_responses: self.slow_responses.swap(0, Ordering::Relaxed),
            backpressure_events: self.backpressure_events.swap(0, Ordering::Relaxed),
        };
        window.last = report.clone();
        report
    }
}
