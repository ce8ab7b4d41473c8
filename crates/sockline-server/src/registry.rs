//! URI routing: ordered matchers over registered handlers.
//!
//! Registration order is significant. Handlers live in a `Vec`, never a keyed
//! map; `dispatch` walks the list and the earliest matching entry wins, so
//! overlapping matchers behave predictably.

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use sockline_proto::{ErrorPayload, RequestEnvelope, ResponseEnvelope};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// How a registered handler claims URIs.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Full-string equality.
    Exact(String),
    /// Unanchored regex search anywhere in the URI.
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, uri: &str) -> bool {
        match self {
            Matcher::Exact(s) => s == uri,
            Matcher::Pattern(re) => re.is_match(uri),
        }
    }
}

/// A request handler bound to a URI matcher.
///
/// The returned value **is** the response payload; a handler responds exactly
/// once per request by construction. Handlers convert their own faults into
/// error-shaped payloads; the registry catches nothing.
#[async_trait]
pub trait UriHandler: Send + Sync {
    async fn handle(&self, request: RequestEnvelope) -> Value;
}

#[async_trait]
impl<F, Fut> UriHandler for F
where
    F: Fn(RequestEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Value> + Send,
{
    async fn handle(&self, request: RequestEnvelope) -> Value {
        (self)(request).await
    }
}

struct HandlerEntry {
    matcher: Matcher,
    label: String,
    handler: Arc<dyn UriHandler>,
}

/// Ordered handler table plus the fallback handler.
pub struct HandlerRegistry {
    entries: RwLock<Vec<HandlerEntry>>,
    fallback: RwLock<Arc<dyn UriHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            fallback: RwLock::new(Arc::new(not_found_handler)),
        }
    }

    /// Append a handler. Earlier registrations win over later ones when
    /// matchers overlap.
    pub fn add_handler(
        &self,
        matcher: Matcher,
        label: impl Into<String>,
        handler: Arc<dyn UriHandler>,
    ) {
        let label = label.into();
        debug!(handler = %label, "URI handler registered");
        self.entries.write().push(HandlerEntry {
            matcher,
            label,
            handler,
        });
    }

    /// Replace the fallback invoked when no matcher claims the URI. The
    /// built-in fallback replies with a `no_handler_found` error payload.
    pub fn set_fallback(&self, handler: Arc<dyn UriHandler>) {
        *self.fallback.write() = handler;
    }

    /// Number of registered handlers, the fallback excluded.
    pub fn handler_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Route one request to its handler and wrap the result in a correlated
    /// response. A request without a `uri` gets a `no_uri` error response and
    /// invokes no handler; its original ID (possibly null) is preserved.
    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let Some(uri) = request.uri.clone() else {
            return ResponseEnvelope::new(request.ipc_req_id, ErrorPayload::no_uri().to_value());
        };

        // Arc-clone the handler out so no lock is held across the await.
        let handler = {
            let entries = self.entries.read();
            match entries.iter().find(|e| e.matcher.matches(&uri)) {
                Some(entry) => {
                    debug!(uri = %uri, handler = %entry.label, "dispatching request");
                    Arc::clone(&entry.handler)
                }
                None => Arc::clone(&self.fallback.read()),
            }
        };

        let id = request.ipc_req_id.clone();
        let data = handler.handle(request).await;
        ResponseEnvelope::new(id, data)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn not_found_handler(request: RequestEnvelope) -> Value {
    let uri = request.uri.as_deref().unwrap_or_default();
    ErrorPayload::no_handler_found(uri).to_value()
}
