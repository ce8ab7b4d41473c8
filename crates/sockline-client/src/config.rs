//! Client configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the tracker notices deadlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExpiryStrategy {
    /// One deadline timer per in-flight request plus a grace-delete timer.
    /// Tight timeout accuracy; the default.
    PerRequestTimer,
    /// A periodic sweep over all pending entries by timestamp. Coarser
    /// granularity, lower timer overhead for very high fan-out clients.
    Sweep {
        /// How often the sweeper runs.
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
}

/// Options for [`crate::IpcClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Deadline for each request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Grace window after a timeout during which a late response is absorbed
    /// silently before the entry is purged.
    #[serde(with = "humantime_serde")]
    pub expire_request: Duration,

    /// Fixed delay between reconnect attempts after a post-connect transport
    /// error. `None` disables auto-reconnect.
    #[serde(with = "humantime_serde")]
    pub auto_reconnect: Option<Duration>,

    /// Client label carried in every request's `userAgent` field.
    pub user_agent: String,

    /// Hoist error-shaped response payloads (`data.code` present) into the
    /// error channel. Shorthand for installing [`crate::code_to_err`].
    pub code_to_err: bool,

    /// Deadline strategy.
    pub expiry: ExpiryStrategy,

    /// Outbound queue depth. A full queue counts a backpressure event and
    /// then waits; it never drops writes.
    pub send_queue: usize,

    /// Emit a stats log line at this interval. `None` disables it.
    #[serde(with = "humantime_serde")]
    pub log_stats_interval: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            expire_request: Duration::from_secs(10),
            auto_reconnect: Some(Duration::from_secs(1)),
            user_agent: crate::default_user_agent(),
            code_to_err: false,
            expiry: ExpiryStrategy::PerRequestTimer,
            send_queue: 64,
            log_stats_interval: None,
        }
    }
}

impl ClientOptions {
    /// Validate option combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout.is_zero() {
            return Err("request_timeout cannot be 0".into());
        }
        if self.send_queue == 0 {
            return Err("send_queue cannot be 0".into());
        }
        if let ExpiryStrategy::Sweep { interval } = self.expiry {
            if interval.is_zero() {
                return Err("sweep interval cannot be 0".into());
            }
        }
        Ok(())
    }
}
