//! # Sockline Server
//!
//! A Unix-socket IPC server speaking newline-delimited JSON. Inbound requests
//! are routed by URI through an ordered handler table; each request runs on
//! its own task, so responses complete in any order and the client matches
//! them back by correlation ID.
//!
//! The server keeps interval stats (requests, opens/closes, concurrent
//! high-water mark, slow responses) and shuts down in bounded time: it asks
//! every connection to end, then waits at most `exit_timeout` before
//! declaring shutdown complete.

pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod stats;

mod pool;

pub use config::ServerConfig;
pub use error::ServerError;
pub use registry::{HandlerRegistry, Matcher, UriHandler};
pub use server::{IpcServer, StaticHandler, URI_DELAY, URI_ECHO};
pub use stats::{StatsAggregator, StatsReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
