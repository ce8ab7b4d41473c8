//! Optional response transforms.
//!
//! A transform is a pure function applied to every correlated response
//! before delivery, splitting it into the error or data channel. The default
//! is identity: everything, error-shaped protocol payloads included, arrives
//! as ordinary data.

use crate::error::ClientError;
use serde_json::Value;
use sockline_proto::ResponseEnvelope;
use std::sync::Arc;

/// Pure function `(responseEnvelope) -> Result<data, error>`.
pub type MessageTransform =
    Arc<dyn Fn(ResponseEnvelope) -> Result<Value, ClientError> + Send + Sync>;

/// Transform that hoists error-shaped payloads into the error channel: a
/// response whose `data` carries a non-null `code` field resolves as
/// [`ClientError::Remote`] instead of data.
pub fn code_to_err() -> MessageTransform {
    Arc::new(|msg: ResponseEnvelope| {
        let has_code = msg
            .data
            .get("code")
            .is_some_and(|code| !code.is_null());
        if has_code {
            Err(ClientError::Remote(msg.data))
        } else {
            Ok(msg.data)
        }
    })
}
