//! Server facade: lifecycle, built-in handlers, stats interval.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::pool::ConnectionPool;
use crate::registry::{HandlerRegistry, Matcher, UriHandler};
use crate::stats::{StatsAggregator, StatsReport};
use parking_lot::Mutex;
use serde_json::Value;
use sockline_proto::RequestEnvelope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Built-in echo endpoint: replies with the request payload verbatim.
pub const URI_ECHO: &str = "/ipcserver/test/echo";
/// Built-in delay endpoint: sleeps `data.delay` milliseconds, then echoes.
pub const URI_DELAY: &str = "/ipcserver/test/delay";

/// Unix-socket IPC server.
///
/// ```ignore
/// let server = IpcServer::new(ServerConfig::new("/var/tmp/app.sock"))?;
/// server.add_handler(Matcher::Exact("/myapi/test".into()), "test", handler);
/// server.startup()?;
/// // ...
/// server.shutdown().await;
/// ```
pub struct IpcServer {
    config: ServerConfig,
    registry: Arc<HandlerRegistry>,
    stats: Arc<StatsAggregator>,
    pool: Arc<ConnectionPool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stats_task: Mutex<Option<JoinHandle<()>>>,
    builtins_registered: AtomicBool,
}

impl IpcServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;
        let registry = Arc::new(HandlerRegistry::new());
        let stats = Arc::new(StatsAggregator::new(config.slow_threshold));
        let pool = Arc::new(ConnectionPool::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.outbound_queue,
        ));
        Ok(Self {
            config,
            registry,
            stats,
            pool,
            accept_task: Mutex::new(None),
            stats_task: Mutex::new(None),
            builtins_registered: AtomicBool::new(false),
        })
    }

    /// Register a handler. Earlier registrations win over later ones when
    /// matchers overlap.
    pub fn add_handler(
        &self,
        matcher: Matcher,
        label: impl Into<String>,
        handler: Arc<dyn UriHandler>,
    ) {
        self.registry.add_handler(matcher, label, handler);
    }

    /// Replace the fallback for URIs no matcher claims.
    pub fn set_default_handler(&self, handler: Arc<dyn UriHandler>) {
        self.registry.set_fallback(handler);
    }

    /// Bind the socket and start accepting connections.
    ///
    /// Registers the built-in [`URI_ECHO`] and [`URI_DELAY`] endpoints, then
    /// starts the accept loop and, when configured, the stats interval task.
    pub fn startup(&self) -> Result<(), ServerError> {
        // Built-ins register once; a repeated startup must not add duplicate
        // echo/delay entries.
        if !self.builtins_registered.swap(true, Ordering::SeqCst) {
            self.register_builtins();
        }

        // Replacing a stale socket file from an earlier run; bind would
        // otherwise fail with AddrInUse.
        let _ = std::fs::remove_file(&self.config.socket_path);
        let listener = UnixListener::bind(&self.config.socket_path)?;
        info!(path = %self.config.socket_path.display(), "IPC server listening");

        let pool = Arc::clone(&self.pool);
        let accept = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => pool.spawn_connection(stream),
                    Err(err) => {
                        error!(code = "ipc_socket_err", error = %err, "accept failed");
                    }
                }
            }
        });
        if let Some(old) = self.accept_task.lock().replace(accept) {
            old.abort();
        }

        if let Some(interval) = self.config.stats_interval {
            let stats = Arc::clone(&self.stats);
            let pool = Arc::clone(&self.pool);
            let registry = Arc::clone(&self.registry);
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await; // immediate first tick
                loop {
                    ticker.tick().await;
                    stats
                        .cycle(pool.open_count() as u64, registry.handler_count() as u64)
                        .log();
                }
            });
            if let Some(old) = self.stats_task.lock().replace(task) {
                old.abort();
            }
        }

        Ok(())
    }

    fn register_builtins(&self) {
        self.registry.add_handler(
            Matcher::Exact(URI_ECHO.into()),
            "builtin-echo",
            Arc::new(|request: RequestEnvelope| async move { request.data }),
        );
        self.registry.add_handler(
            Matcher::Exact(URI_DELAY.into()),
            "builtin-delay",
            Arc::new(|request: RequestEnvelope| async move {
                let delay_ms = request.data["delay"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                request.data
            }),
        );
    }

    /// Last completed stats window plus the live gauges.
    pub fn get_stats(&self) -> StatsReport {
        self.stats.get_stats(
            self.pool.open_count() as u64,
            self.registry.handler_count() as u64,
        )
    }

    /// Close out the current stats window and log it. The interval task does
    /// this on its own when `stats_interval` is set.
    pub fn log_interval_stats(&self) {
        self.stats
            .cycle(
                self.pool.open_count() as u64,
                self.registry.handler_count() as u64,
            )
            .log();
    }

    pub fn open_connections(&self) -> usize {
        self.pool.open_count()
    }

    /// End every open connection without stopping the listener. New clients
    /// may still connect afterwards.
    pub fn close_connections(&self) {
        self.pool.close_all();
    }

    /// Stop accepting, end every connection, wait up to `exit_timeout` for
    /// the pool to drain. Completes regardless of whether it drained.
    pub async fn shutdown(&self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.stats_task.lock().take() {
            task.abort();
        }
        self.pool.close_all();
        if !self.pool.wait_drained(self.config.exit_timeout).await {
            warn!(
                code = "ipc_server_close",
                open = self.pool.open_count(),
                "shutdown timed out waiting for connections; proceeding"
            );
        }
        let _ = std::fs::remove_file(&self.config.socket_path);
        info!("IPC server shut down");
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.stats_task.lock().take() {
            task.abort();
        }
    }
}

/// Adapter for plain handler values: replies with a fixed payload.
pub struct StaticHandler(pub Value);

#[async_trait::async_trait]
impl UriHandler for StaticHandler {
    async fn handle(&self, _request: RequestEnvelope) -> Value {
        self.0.clone()
    }
}
