//! Per-request handler context: the single object threaded through the
//! layer pipeline and into the terminal handler (spec.md §3/§4.F).
//!
//! Metadata is two-tiered: an immutable map seeded at handler-registration
//! time (decorator metadata such as `customMetadata`, route annotations)
//! that every request sees, overlaid with a mutable, request-scoped map
//! that layers populate (`validatedBody`, `validatedQuery`, ...). A read
//! checks the request-scoped map first and falls back to the decoration
//! map, so a layer can shadow a decoration-time default without mutating
//! shared state.
//!
//! spec.md's fallback for a runtime without task-local storage is to pass
//! the request-scoped logger explicitly through the context; here that
//! handle is the `tracing::Span` already carried on every `HandlerContext`
//! (`dispatch.rs` opens it once per request and re-enters it for every
//! layer and the terminal step). Logging through it is `tracing`'s own
//! idiom -- `let _enter = ctx.span.enter();` followed by `tracing::info!`
//! -- rather than a bespoke logger trait, matching how the rest of this
//! crate never reaches past `tracing` for structured logging.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::Span;

use crate::http::{HttpRequest, HttpResponse};

#[derive(Clone)]
pub struct HandlerContext {
    pub request: HttpRequest,
    /// Set by a layer that short-circuits the pipeline (spec.md §4.F); the
    /// dispatcher returns this verbatim instead of invoking the handler.
    pub short_circuit: Option<HttpResponse>,
    pub handler_id: String,
    /// The request's structured-logging scope -- doubles as the
    /// request-scoped logger spec.md asks a function handler's context to
    /// carry. Entering it (`ctx.span.enter()`) attaches every subsequent
    /// `tracing` event to this request for the lifetime of the guard.
    pub span: Span,
    /// Positional controller-method arguments assembled by the dispatcher
    /// from the handler's parameter-extraction descriptors, in declaration
    /// order (spec.md §4.G step 3). Empty for a function handler.
    pub assembled_args: Vec<Value>,
    decoration_metadata: Arc<HashMap<String, Value>>,
    request_metadata: HashMap<String, Value>,
}

impl HandlerContext {
    pub fn new(
        request: HttpRequest,
        handler_id: impl Into<String>,
        decoration_metadata: Arc<HashMap<String, Value>>,
        span: Span,
    ) -> Self {
        Self {
            request,
            short_circuit: None,
            handler_id: handler_id.into(),
            span,
            assembled_args: Vec::new(),
            decoration_metadata,
            request_metadata: HashMap::new(),
        }
    }

    /// Reads request-scoped metadata first, falling back to decoration
    /// metadata set at registration time.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.request_metadata
            .get(key)
            .or_else(|| self.decoration_metadata.get(key))
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: Value) {
        self.request_metadata.insert(key.into(), value);
    }

    pub fn decoration_meta(&self, key: &str) -> Option<&Value> {
        self.decoration_metadata.get(key)
    }
}
