//! Connection state machine.
//!
//! One `ConnectionManager` owns the socket for one client instance: a reader
//! task that decodes frames and routes them (tracker or push subscribers), a
//! writer task fed by a bounded queue, and the reconnect policy. All request
//! state lives in the [`RequestTracker`]; the manager only moves envelopes.

use crate::config::{ClientOptions, ExpiryStrategy};
use crate::error::ClientError;
use crate::stats::ClientStats;
use crate::tracker::RequestTracker;
use crate::transform::MessageTransform;
use parking_lot::Mutex;
use serde_json::Value;
use sockline_proto::{FrameError, FrameReader, FrameWriter, RequestEnvelope, ResponseEnvelope};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Capacity of the unsolicited-push fan-out channel.
const PUSH_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

pub(crate) struct ConnectionManager {
    path: PathBuf,
    options: ClientOptions,
    tracker: Arc<RequestTracker>,
    stats: Arc<ClientStats>,
    transform: Option<MessageTransform>,
    state: Mutex<ConnState>,
    /// Present exactly while Connected; cleared on disconnect so sends fail
    /// fast with `NoOpenStream` without touching the tracker.
    writer_tx: Mutex<Option<mpsc::Sender<RequestEnvelope>>>,
    push_tx: broadcast::Sender<Value>,
    /// Serializes dial attempts so two `connect` callers cannot both pass the
    /// state check and install a second reader over a live stream.
    connect_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    aux_started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub(crate) fn new(
        path: impl AsRef<Path>,
        options: ClientOptions,
        transform: Option<MessageTransform>,
    ) -> Self {
        let stats = Arc::new(ClientStats::default());
        let tracker = Arc::new(RequestTracker::new(
            options.expire_request,
            &options.expiry,
            Arc::clone(&stats),
        ));
        let (push_tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            tracker,
            stats,
            transform,
            state: Mutex::new(ConnState::Disconnected),
            writer_tx: Mutex::new(None),
            push_tx,
            connect_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            aux_started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    pub(crate) fn stats(&self) -> &Arc<ClientStats> {
        &self.stats
    }

    pub(crate) fn is_connected(&self) -> bool {
        *self.state.lock() == ConnState::Connected
    }

    /// Establish the connection. Exactly one of success or failure is
    /// returned per call; a failure before the first successful connect
    /// fails that attempt only and schedules nothing.
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        let _dial = self.connect_lock.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        if self.is_connected() {
            return Ok(());
        }
        self.start_aux();
        *self.state.lock() = ConnState::Connecting;
        match UnixStream::connect(&self.path).await {
            Ok(stream) => {
                self.install(stream);
                debug!(path = %self.path.display(), "connection created");
                Ok(())
            }
            Err(err) => {
                *self.state.lock() = ConnState::Disconnected;
                error!(code = "ipc_socket_err", error = %err, "unexpected socket error");
                Err(ClientError::Transport(err))
            }
        }
    }

    /// Wire up the reader and writer tasks for a freshly connected stream.
    fn install(self: &Arc<Self>, stream: UnixStream) {
        let (read_half, write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::channel::<RequestEnvelope>(self.options.send_queue);
        *self.writer_tx.lock() = Some(tx);
        *self.state.lock() = ConnState::Connected;

        let writer_task = tokio::spawn(async move {
            let mut writer = FrameWriter::new(write_half);
            while let Some(envelope) = rx.recv().await {
                if let Err(err) = writer.write(&envelope).await {
                    error!(code = "stream_err", error = %err, "write to server failed");
                    break;
                }
            }
        });

        let manager = Arc::clone(self);
        let reader_task = tokio::spawn(async move {
            let mut reader = FrameReader::new(read_half);
            loop {
                match reader.next::<Value>().await {
                    Ok(Some(frame)) => manager.handle_frame(frame),
                    Ok(None) => {
                        debug!("server disconnected");
                        break;
                    }
                    Err(FrameError::Malformed(err)) => {
                        // Skip the bad frame; the stream itself is fine.
                        error!(code = "stream_err", error = %err, "got error from stream");
                    }
                    Err(FrameError::Io(err)) => {
                        error!(code = "ipc_socket_err", error = %err, "unexpected socket error");
                        break;
                    }
                }
            }
            manager.on_disconnect();
        });

        self.tasks.lock().extend([writer_task, reader_task]);
    }

    /// Route one decoded frame: correlated responses resolve the tracker,
    /// frames without an ID fan out to push subscribers.
    fn handle_frame(&self, frame: Value) {
        let id = frame
            .get("ipcReqID")
            .and_then(Value::as_str)
            .map(str::to_owned);
        match id {
            Some(id) => {
                let data = frame.get("data").cloned().unwrap_or(Value::Null);
                let outcome = match &self.transform {
                    Some(transform) => transform(ResponseEnvelope::new(Some(id.clone()), data)),
                    None => Ok(data),
                };
                self.tracker.resolve(&id, outcome);
            }
            None => {
                debug!("server message with no request ID");
                let _ = self.push_tx.send(frame);
            }
        }
    }

    /// The connection ended. Drain every pending request with a disconnect
    /// signal and, unless the client was explicitly closed, schedule
    /// fixed-delay reconnect attempts.
    fn on_disconnect(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if *state == ConnState::Disconnected {
                return;
            }
            *state = ConnState::Disconnected;
        }
        *self.writer_tx.lock() = None;
        self.tracker.drain_all();

        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(delay) = self.options.auto_reconnect {
            debug!(delay_ms = delay.as_millis() as u64, "auto reconnect scheduled");
            let manager = Arc::clone(self);
            let handle = tokio::spawn(async move {
                loop {
                    tokio::time::sleep(delay).await;
                    if manager.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    if manager.connect().await.is_ok() {
                        break;
                    }
                }
            });
            self.tasks.lock().push(handle);
        }
    }

    /// Send one request and await its correlated response.
    pub(crate) async fn send(&self, uri: String, data: Value) -> Result<Value, ClientError> {
        let Some(tx) = self.writer_tx.lock().clone() else {
            error!(code = "no_open_stream", uri = %uri, "no valid stream is open");
            return Err(ClientError::NoOpenStream);
        };

        let id = self.tracker.allocate();
        let envelope =
            RequestEnvelope::new(id.as_str(), uri.as_str(), data, self.options.user_agent.as_str());
        let rx = self
            .tracker
            .register(id.clone(), uri, self.options.request_timeout);
        self.stats.sent.fetch_add(1, Ordering::Relaxed);

        let queued = match tx.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                self.stats.backpressure.fetch_add(1, Ordering::Relaxed);
                debug!(id = %id, "outbound queue full, waiting");
                tx.send(envelope).await.is_ok()
            }
            Err(TrySendError::Closed(_)) => false,
        };
        if !queued {
            // Connection raced shut between the stream check and the enqueue.
            self.tracker.resolve(&id, Err(ClientError::Disconnected));
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Disconnected),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.push_tx.subscribe()
    }

    /// Terminal: cancel every task and timer, drain pending requests. No
    /// auto-reconnect afterwards.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("client closed");
        *self.state.lock() = ConnState::Disconnected;
        *self.writer_tx.lock() = None;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.tracker.drain_all();
    }

    /// Start the sweeper and stats-logging background tasks once.
    fn start_aux(self: &Arc<Self>) {
        if self.aux_started.swap(true, Ordering::SeqCst) {
            return;
        }
        if let ExpiryStrategy::Sweep { interval } = self.options.expiry {
            let handle = tokio::spawn(Arc::clone(&self.tracker).run_sweeper(interval));
            self.tasks.lock().push(handle);
        }
        if let Some(interval) = self.options.log_stats_interval {
            let manager = Arc::clone(self);
            let handle = tokio::spawn(async move {
                let mut tick = tokio::time::interval(interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tick.tick().await;
                    manager.stats.log(manager.tracker.pending_count());
                }
            });
            self.tasks.lock().push(handle);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
