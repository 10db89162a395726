//! Validation layer contract (spec.md §4.F/§9 Non-goals). This crate does
//! not ship a schema engine -- that is explicitly out of scope -- but it
//! does define the seam a host's schema engine plugs into: a `parse`
//! contract, the reserved metadata keys a handler reads validated data
//! back from, and the layer that wires the two together, wrapping a
//! failed parse as a 400 carrying an `issues` array.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::HandlerContext;
use crate::error::HttpException;
use crate::pipeline::{DispatchOutcome, Layer, Next};

pub const VALIDATED_BODY: &str = "validatedBody";
pub const VALIDATED_QUERY: &str = "validatedQuery";
pub const VALIDATED_PARAMS: &str = "validatedParams";
pub const VALIDATED_HEADERS: &str = "validatedHeaders";

#[derive(Debug, Clone)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

/// A host-supplied schema: validates (and may coerce) a JSON value,
/// returning the individual issues found rather than failing fast, so
/// the 400 response can report all of them at once.
pub trait RequestSchema: Send + Sync {
    fn parse(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>>;
}

fn bad_request(issues: Vec<SchemaIssue>) -> HttpException {
    let issues_json: Vec<Value> = issues
        .into_iter()
        .map(|i| serde_json::json!({ "path": i.path, "message": i.message }))
        .collect();
    HttpException::bad_request("Request validation failed").with_details(Value::Array(issues_json))
}

/// Applies up to four schemas (body/query/params/headers) to the request
/// and stashes their parsed output under the reserved metadata keys
/// above, for a handler's parameter extraction to read back
/// (spec.md §4.G).
#[derive(Clone, Default)]
pub struct ValidationLayer {
    pub body: Option<Arc<dyn RequestSchema>>,
    pub query: Option<Arc<dyn RequestSchema>>,
    pub params: Option<Arc<dyn RequestSchema>>,
    pub headers: Option<Arc<dyn RequestSchema>>,
}

impl ValidationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.body = Some(schema);
        self
    }
    pub fn with_query(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.query = Some(schema);
        self
    }
    pub fn with_params(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.params = Some(schema);
        self
    }
    pub fn with_headers(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.headers = Some(schema);
        self
    }
}

#[async_trait]
impl Layer for ValidationLayer {
    fn name(&self) -> &str {
        "validation"
    }

    async fn handle(&self, mut ctx: HandlerContext, next: Next) -> DispatchOutcome {
        if let Some(schema) = &self.body {
            let body = ctx.request.body.clone().unwrap_or(Value::Null);
            match schema.parse(&body) {
                Ok(parsed) => ctx.set_meta(VALIDATED_BODY, parsed),
                Err(issues) => return Err(bad_request(issues).into()),
            }
        }
        if let Some(schema) = &self.query {
            let query = crate::http::multi_map_to_value(&ctx.request.query);
            match schema.parse(&query) {
                Ok(parsed) => ctx.set_meta(VALIDATED_QUERY, parsed),
                Err(issues) => return Err(bad_request(issues).into()),
            }
        }
        if let Some(schema) = &self.params {
            let params = crate::http::single_map_to_value(&ctx.request.params);
            match schema.parse(&params) {
                Ok(parsed) => ctx.set_meta(VALIDATED_PARAMS, parsed),
                Err(issues) => return Err(bad_request(issues).into()),
            }
        }
        if let Some(schema) = &self.headers {
            let headers = crate::http::multi_map_to_value(&ctx.request.headers);
            match schema.parse(&headers) {
                Ok(parsed) => ctx.set_meta(VALIDATED_HEADERS, parsed),
                Err(issues) => return Err(bad_request(issues).into()),
            }
        }
        next.call(ctx).await
    }
}
