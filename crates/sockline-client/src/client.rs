//! Client facade.

use crate::config::ClientOptions;
use crate::conn::ConnectionManager;
use crate::error::ClientError;
use crate::stats::ClientStatsSnapshot;
use crate::transform::{self, MessageTransform};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Asynchronous IPC client.
///
/// Cheap to clone; clones share the connection, the correlation table, and
/// the stats. Instrumented variants (request counters and the like) are
/// written as wrappers around a clone rather than subclasses.
///
/// ```ignore
/// let client = IpcClient::new("/var/tmp/app.sock");
/// client.connect().await?;
/// let result = client.send("/myapi/test", json!({"message": "foo"})).await?;
/// ```
#[derive(Clone)]
pub struct IpcClient {
    inner: Arc<ConnectionManager>,
}

impl IpcClient {
    /// Client with default options.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(ConnectionManager::new(path, ClientOptions::default(), None)),
        }
    }

    /// Client with explicit options. `code_to_err` installs the built-in
    /// error-hoisting transform.
    pub fn with_options(path: impl AsRef<Path>, options: ClientOptions) -> Result<Self, ClientError> {
        options.validate().map_err(ClientError::Config)?;
        let transform = options.code_to_err.then(transform::code_to_err);
        Ok(Self {
            inner: Arc::new(ConnectionManager::new(path, options, transform)),
        })
    }

    /// Client with a custom response transform; takes precedence over
    /// `code_to_err`.
    pub fn with_transform(
        path: impl AsRef<Path>,
        options: ClientOptions,
        transform: MessageTransform,
    ) -> Result<Self, ClientError> {
        options.validate().map_err(ClientError::Config)?;
        Ok(Self {
            inner: Arc::new(ConnectionManager::new(path, options, Some(transform))),
        })
    }

    /// Connect to the server. Resolves to exactly one of success or failure;
    /// a failure here schedules no reconnect attempts.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.inner.connect().await
    }

    /// Send a request and await its correlated response.
    ///
    /// Fails immediately with [`ClientError::NoOpenStream`] when not
    /// connected; nothing is registered in that case.
    pub async fn send(&self, uri: impl Into<String>, data: Value) -> Result<Value, ClientError> {
        self.inner.send(uri.into(), data).await
    }

    /// Receive unsolicited server pushes (frames without a correlation ID).
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.inner.subscribe()
    }

    /// Close the client. Terminal: drains pending requests, cancels timers,
    /// never reconnects.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Currently tracked requests (pending plus grace-retained).
    pub fn pending_count(&self) -> usize {
        self.inner.tracker().pending_count()
    }

    pub fn stats(&self) -> ClientStatsSnapshot {
        self.inner.stats().snapshot()
    }

    /// Emit one structured stats log line.
    pub fn log_stats(&self) {
        self.inner.stats().log(self.pending_count());
    }
}
