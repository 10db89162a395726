//! Transport-neutral request/response types (spec.md §3). These carry no
//! wire-protocol parsing of their own; a host adapter outside this crate
//! is expected to translate to/from whatever network layer it terminates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use http::Method;
use serde_json::Value;

/// A header/query value that may appear once or many times for the same
/// name (spec.md §3 "single-or-multi"). Stored as a `Vec` rather than a
/// dedicated enum -- a single value is simply a one-element vector -- so
/// callers never have to match on shape before reading the common case.
pub type MultiMap = HashMap<String, Vec<String>>;

/// Renders a single-or-multi map to JSON: a bare string for exactly one
/// value, a string array otherwise (spec.md §3).
pub fn multi_map_to_value(map: &MultiMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| {
                let value = match v.as_slice() {
                    [single] => Value::String(single.clone()),
                    many => Value::Array(many.iter().cloned().map(Value::String).collect()),
                };
                (k.clone(), value)
            })
            .collect(),
    )
}

pub(crate) fn single_map_to_value(map: &HashMap<String, String>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect())
}

/// An inbound request, already parsed into method/path/headers/query and a
/// JSON-decoded body where one was present. Parameter extraction
/// (`params`) is populated by the router before dispatch.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: MultiMap,
    pub query: MultiMap,
    pub params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
    /// Stamped by the dispatcher if the host never set one (spec.md §3).
    pub request_id: Option<String>,
    pub request_time: Option<DateTime<Utc>>,
    /// Per-guard authorization results, keyed by guard name; read by
    /// [`extract_user_id`] and by an `@Auth()`-style controller parameter
    /// (spec.md §3, §8 "User-id extraction").
    pub auth: HashMap<String, Value>,
    pub client_ip: Option<String>,
    pub trace_context: HashMap<String, String>,
    pub user_agent: Option<String>,
    /// Set by the dispatcher once a handler has been resolved (spec.md §3).
    pub matched_route: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            params: HashMap::new(),
            cookies: HashMap::new(),
            content_type: None,
            body: None,
            request_id: None,
            request_time: None,
            auth: HashMap::new(),
            client_ip: None,
            trace_context: HashMap::new(),
            user_agent: None,
            matched_route: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_request_time(mut self, request_time: DateTime<Utc>) -> Self {
        self.request_time = Some(request_time);
        self
    }

    pub fn with_auth(mut self, key: impl Into<String>, value: Value) -> Self {
        self.auth.insert(key.into(), value);
        self
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn with_trace_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.trace_context.insert(key.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_matched_route(mut self, route: impl Into<String>) -> Self {
        self.matched_route = Some(route.into());
        self
    }

    /// First value for a header name, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Returns the first string/number value found, across every guard
    /// result in [`Self::auth`], in priority order `claims.sub`, `sub`,
    /// `userId`, `user_id` -- coerced to a string (spec.md §8 "User-id
    /// extraction").
    pub fn user_id(&self) -> Option<String> {
        extract_user_id(&self.auth)
    }

    /// JSON snapshot of the whole request, used for an `@Req()`-style
    /// controller parameter that wants the raw request rather than one
    /// extracted field (spec.md §3 "request").
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "method": self.method.as_str(),
            "path": self.path,
            "headers": multi_map_to_value(&self.headers),
            "query": multi_map_to_value(&self.query),
            "params": self.params,
            "cookies": self.cookies,
            "contentType": self.content_type,
            "body": self.body,
            "requestId": self.request_id,
            "requestTime": self.request_time.map(|t| t.to_rfc3339()),
            "clientIp": self.client_ip,
            "traceContext": self.trace_context,
            "userAgent": self.user_agent,
            "matchedRoute": self.matched_route,
        })
    }
}

fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lookup_path<'a>(result: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = result;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Given an auth map (one entry per guard that ran), returns the first
/// string/number value found in priority order `claims.sub`, `sub`,
/// `userId`, `user_id`, scanning every guard result at each priority tier
/// before moving to the next (spec.md §8 "User-id extraction").
pub fn extract_user_id(auth: &HashMap<String, Value>) -> Option<String> {
    const PRIORITY: [&[&str]; 4] = [&["claims", "sub"], &["sub"], &["userId"], &["user_id"]];
    for path in PRIORITY {
        for result in auth.values() {
            if let Some(value) = lookup_path(result, path).and_then(coerce_to_string) {
                return Some(value);
            }
        }
    }
    None
}

/// A response in its fully-normalised form: a status, a header map and a
/// JSON body (possibly absent for a 204). The normalisation rules that
/// turn a raw handler return value into this shape live in `dispatch.rs`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// A bare string body still gets `application/json` as its content
    /// type, matching the source framework's response normalisation
    /// (spec.md §4.G/§8) rather than `text/plain` -- the string is treated
    /// as an already-serialised JSON value, not prose.
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let mut resp = Self::new(status);
        resp.headers
            .insert("content-type".to_string(), "application/json".to_string());
        resp.body = Some(Value::String(text.into()));
        resp
    }

    pub fn json(status: u16, body: Value) -> Self {
        let mut resp = Self::new(status);
        resp.headers
            .insert("content-type".to_string(), "application/json".to_string());
        resp.body = Some(body);
        resp
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
