//! Client error taxonomy.
//!
//! Transport and timeout errors are always surfaced to the caller in flight;
//! protocol and application payloads pass through as ordinary data unless a
//! response transform hoists them into [`ClientError::Remote`].

use serde_json::Value;

/// Errors surfaced by [`crate::IpcClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid client options.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level failure (connect refused, broken pipe, ...).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// `send` was called with no open stream; nothing was registered.
    #[error("no valid stream is open")]
    NoOpenStream,

    /// No response arrived within the configured deadline.
    #[error("request timed out: {uri}")]
    Timeout {
        /// Routing key of the expired request.
        uri: String,
    },

    /// The connection ended while the request was in flight.
    #[error("connection ended with request in flight")]
    Disconnected,

    /// The client was explicitly closed.
    #[error("client is closed")]
    Closed,

    /// Error-shaped payload hoisted out of a response by a transform.
    #[error("remote error: {0}")]
    Remote(Value),
}

/// What a pending request ultimately resolves to.
pub type Outcome = Result<Value, ClientError>;
