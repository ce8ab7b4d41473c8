//! Request and response envelopes.
//!
//! Field names on the wire are fixed (`ipcReqID`, `userAgent`); Rust-side
//! names follow the usual snake_case with explicit serde renames.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol error code: request carried no `uri`.
pub const CODE_NO_URI: &str = "no_uri";
/// Protocol error code: no registered handler matched the `uri`.
pub const CODE_NO_HANDLER_FOUND: &str = "no_handler_found";

/// Client→server request envelope.
///
/// `uri` and `ipcReqID` are optional on the decode path: a request without a
/// `uri` is a protocol error answered by the server, not a decode failure,
/// and a request without an ID simply cannot be correlated (the server still
/// responds, tagging the response with `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation ID, unique among the sending client's in-flight requests.
    #[serde(rename = "ipcReqID", default, skip_serializing_if = "Option::is_none")]
    pub ipc_req_id: Option<String>,

    /// Routing key. An opaque string, not necessarily a web resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Arbitrary request payload.
    #[serde(default)]
    pub data: Value,

    /// Sender's OS process ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Caller-configurable client label.
    #[serde(rename = "userAgent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestEnvelope {
    /// Build a fully-populated request as the client sends it.
    pub fn new(
        id: impl Into<String>,
        uri: impl Into<String>,
        data: Value,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            ipc_req_id: Some(id.into()),
            uri: Some(uri.into()),
            data,
            pid: Some(std::process::id()),
            user_agent: Some(user_agent.into()),
        }
    }
}

/// Server→client response envelope.
///
/// `ipcReqID` is serialized even when `null` so a correlated error response
/// to an ID-less request is distinguishable from an unsolicited push only by
/// its `null` value; a frame with no `ipcReqID` key at all is a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation ID copied from the request, or `null` if the request had none.
    #[serde(rename = "ipcReqID")]
    pub ipc_req_id: Option<String>,

    /// Response payload (application data or an [`ErrorPayload`]).
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    /// Correlated response for `request_id` (or `null` if the request had none).
    pub fn new(request_id: Option<String>, data: Value) -> Self {
        Self {
            ipc_req_id: request_id,
            data,
        }
    }

    /// True when this frame is an unsolicited push rather than a correlation
    /// match candidate.
    pub fn is_push(&self) -> bool {
        self.ipc_req_id.is_none()
    }
}

/// Error-shaped payload carried inside `data` for protocol errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable machine-readable code (`no_uri`, `no_handler_found`, ...).
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Payload for a request that carried no `uri`.
    pub fn no_uri() -> Self {
        Self::new(CODE_NO_URI, "Missing required uri parameter from request")
    }

    /// Payload for a `uri` no registered handler matched.
    pub fn no_handler_found(uri: &str) -> Self {
        Self::new(CODE_NO_HANDLER_FOUND, format!("No handler found for {uri}"))
    }

    /// Serialize into a JSON value for embedding in a response envelope.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
