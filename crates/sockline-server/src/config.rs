//! Server configuration with validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`crate::IpcServer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Filesystem path of the listening socket. A stale socket file at this
    /// path is removed before binding.
    pub socket_path: PathBuf,

    /// Upper bound on how long shutdown waits for open connections to drain.
    /// Shutdown completes when this elapses even if connections remain.
    #[serde(with = "humantime_serde")]
    pub exit_timeout: Duration,

    /// Handler runs longer than this count as slow responses in the stats.
    #[serde(with = "humantime_serde")]
    pub slow_threshold: Duration,

    /// Cycle and log the stats window at this interval. `None` disables the
    /// interval task; stats still accumulate and can be cycled by hand with
    /// [`crate::IpcServer::log_interval_stats`].
    #[serde(with = "humantime_serde")]
    pub stats_interval: Option<Duration>,

    /// Per-connection outbound queue depth. A full queue counts a
    /// backpressure event and then waits; responses are never dropped while
    /// the connection is open.
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/tmp/sockline.sock"),
            exit_timeout: Duration::from_secs(2),
            slow_threshold: Duration::from_millis(100),
            stats_interval: None,
            outbound_queue: 64,
        }
    }
}

impl ServerConfig {
    /// Defaults with an explicit socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    /// Validate option combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.socket_path.as_os_str().is_empty() {
            return Err("socket_path cannot be empty".into());
        }
        if self.exit_timeout.is_zero() {
            return Err("exit_timeout cannot be 0".into());
        }
        if self.outbound_queue == 0 {
            return Err("outbound_queue cannot be 0".into());
        }
        Ok(())
    }
}
