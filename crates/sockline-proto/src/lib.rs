//! # Sockline Protocol
//!
//! Wire types and framing for the sockline IPC layer.
//!
//! The wire format is a sequence of UTF-8 JSON objects, one per line,
//! over any reliable ordered byte stream (Unix socket, pipe, TCP):
//!
//! ```text
//! client → server   {"ipcReqID":"rq0","uri":"/myapi/test","data":{...},"pid":4242,"userAgent":"..."}
//! server → client   {"ipcReqID":"rq0","data":{...}}
//! server → client   {"data":{...}}                 <- unsolicited push (no ipcReqID)
//! ```
//!
//! Responses are correlated by `ipcReqID` only; they may arrive in any order
//! relative to the requests that produced them.

pub mod codec;
pub mod envelope;

pub use codec::{FrameError, FrameReader, FrameWriter};
pub use envelope::{
    ErrorPayload, RequestEnvelope, ResponseEnvelope, CODE_NO_HANDLER_FOUND, CODE_NO_URI,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
