//! # Sockline Client
//!
//! A long-lived IPC client that holds one streaming connection to a sockline
//! server and issues uniquely-correlated asynchronous requests over it.
//!
//! ```text
//! send(uri, data)
//!   └─ RequestTracker allocates "rq{n}", registers a deadline
//!        └─ envelope written through the frame codec
//!             ... any number of requests interleave on the one stream ...
//!        ┌─ decoded response frame arrives (any order)
//!   ┌─ RequestTracker resolves the pending entry by ID
//! result returned to the caller
//! ```
//!
//! Responses are matched by correlation ID, never by issue order: a slow
//! handler's response may surface after a later request's faster one. A
//! request that outlives its deadline resolves with [`ClientError::Timeout`];
//! the entry is retained for a grace window so the straggling response is
//! absorbed silently instead of reported as unmatched.
//!
//! Connection loss drains every pending request with
//! [`ClientError::Disconnected`] and, when auto-reconnect is configured,
//! retries at a fixed delay until the server returns or [`IpcClient::close`]
//! is called.

pub mod client;
pub mod config;
pub mod error;
pub mod stats;
pub mod tracker;
pub mod transform;

mod conn;

pub use client::IpcClient;
pub use config::{ClientOptions, ExpiryStrategy};
pub use error::ClientError;
pub use stats::{ClientStats, ClientStatsSnapshot};
pub use tracker::RequestTracker;
pub use transform::{code_to_err, MessageTransform};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default client label sent in every request envelope's `userAgent` field.
pub fn default_user_agent() -> String {
    format!("DefaultClient/sockline-{VERSION}")
}
