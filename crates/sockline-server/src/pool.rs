//! Live connection set and per-connection read/write tasks.

use crate::registry::HandlerRegistry;
use crate::stats::StatsAggregator;
use dashmap::DashMap;
use sockline_proto::{FrameError, FrameReader, FrameWriter, RequestEnvelope, ResponseEnvelope};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::{self, Instant};
use tracing::{debug, error};

struct ConnectionHandle {
    /// Fed by dispatch tasks, drained by the writer task.
    outbound: mpsc::Sender<ResponseEnvelope>,
    /// Signals the reader task to stop for a proactive close.
    closer: Arc<Notify>,
}

/// Tracks every open connection and runs their I/O tasks.
///
/// Each inbound request is dispatched on its own task, so a slow handler
/// never blocks later requests on the same connection. Responses therefore
/// complete in any order; correlation is by request ID only.
pub(crate) struct ConnectionPool {
    connections: DashMap<u64, ConnectionHandle>,
    next_id: AtomicU64,
    registry: Arc<HandlerRegistry>,
    stats: Arc<StatsAggregator>,
    outbound_queue: usize,
    /// Notified whenever the set becomes empty.
    drained: Notify,
}

impl ConnectionPool {
    pub(crate) fn new(
        registry: Arc<HandlerRegistry>,
        stats: Arc<StatsAggregator>,
        outbound_queue: usize,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            registry,
            stats,
            outbound_queue,
            drained: Notify::new(),
        }
    }

    pub(crate) fn open_count(&self) -> usize {
        self.connections.len()
    }

    /// Adopt an accepted stream: register it and start its reader and writer
    /// tasks.
    pub(crate) fn spawn_connection(self: &Arc<Self>, stream: UnixStream) {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, mut outbound_rx) = mpsc::channel::<ResponseEnvelope>(self.outbound_queue);
        let closer = Arc::new(Notify::new());

        self.connections.insert(
            conn_id,
            ConnectionHandle {
                outbound: outbound.clone(),
                closer: Arc::clone(&closer),
            },
        );
        self.stats.connection_opened(self.connections.len() as u64);
        debug!(conn_id, "client connected");

        let (read_half, write_half) = stream.into_split();

        // Writer: exits when every response sender is gone or the socket
        // breaks. A write failure here means the peer vanished mid-response;
        // the queued frames are discarded with it.
        tokio::spawn(async move {
            let mut writer = FrameWriter::new(write_half);
            while let Some(response) = outbound_rx.recv().await {
                if let Err(err) = writer.write(&response).await {
                    error!(code = "stream_err", error = %err, "failed to write response");
                    break;
                }
            }
        });

        // Reader: decode frames until EOF, socket error, or a close signal.
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut reader = FrameReader::new(read_half);
            loop {
                tokio::select! {
                    _ = closer.notified() => {
                        debug!(conn_id, "connection close requested");
                        break;
                    }
                    frame = reader.next::<RequestEnvelope>() => match frame {
                        Ok(Some(request)) => pool.dispatch_request(conn_id, request),
                        Ok(None) => {
                            debug!(conn_id, "client disconnected");
                            break;
                        }
                        Err(FrameError::Malformed(err)) => {
                            // Skip the bad line; the stream itself is intact.
                            error!(code = "stream_err", conn_id, error = %err, "malformed request frame");
                        }
                        Err(FrameError::Io(err)) => {
                            error!(code = "stream_err", conn_id, error = %err, "socket read error");
                            break;
                        }
                    },
                }
            }
            pool.forget(conn_id);
        });
    }

    /// Run one request through the registry on its own task and queue the
    /// response.
    fn dispatch_request(self: &Arc<Self>, conn_id: u64, request: RequestEnvelope) {
        self.stats.request_received();
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let started = Instant::now();
            let response = pool.registry.dispatch(request).await;
            pool.stats.response_finished(started.elapsed());
            pool.respond(conn_id, response).await;
        });
    }

    /// Queue a response on its connection's outbound channel. A respond to a
    /// connection that has since closed is a logged no-op.
    async fn respond(&self, conn_id: u64, response: ResponseEnvelope) {
        let Some(outbound) = self
            .connections
            .get(&conn_id)
            .map(|handle| handle.outbound.clone())
        else {
            debug!(conn_id, "dropping response for closed connection");
            return;
        };

        match outbound.try_send(response) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(response)) => {
                self.stats.backpressure_event();
                if outbound.send(response).await.is_err() {
                    debug!(conn_id, "dropping response for closed connection");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn_id, "dropping response for closed connection");
            }
        }
    }

    /// Drop a connection from the set. In-flight dispatch tasks for it finish
    /// on their own and their responses are swallowed.
    fn forget(&self, conn_id: u64) {
        if self.connections.remove(&conn_id).is_some() {
            self.stats.connection_closed();
            if self.connections.is_empty() {
                self.drained.notify_waiters();
            }
        }
    }

    /// Ask every open connection to end. The listener keeps accepting.
    pub(crate) fn close_all(&self) {
        for entry in self.connections.iter() {
            entry.value().closer.notify_one();
        }
    }

    /// Wait until the set is empty, at most `timeout`. Returns whether the
    /// pool actually drained.
    pub(crate) async fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.drained.notified();
            if self.connections.is_empty() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = time::timeout(remaining, notified).await;
        }
    }
}
