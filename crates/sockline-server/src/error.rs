//! Server error types.

use thiserror::Error;

/// Failures raised by [`crate::IpcServer`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid server configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound.
    #[error("failed to bind socket: {0}")]
    Bind(#[from] std::io::Error),
}
