//! Route matching (spec.md §8 "Route matching"): turns a resolved
//! handler's declared path template and a concrete request path into a
//! yes/no match plus the extracted path parameters.
//!
//! Templates use the same `{name}` placeholder syntax the host's own
//! OpenAPI-facing path normalisation uses for path parameters -- a
//! segment wrapped in braces accepts any single literal segment and
//! binds its value to `name`; every other segment must match exactly.
//! Segment counts must match: `/a/{b}` never matches `/a/b/c`.

use std::collections::HashMap;

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

fn param_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{').and_then(|s| s.strip_suffix('}'))
}

/// Attempts to match `request_path` against `template`, returning the
/// extracted `{name}` bindings on success.
pub fn match_route(template: &str, request_path: &str) -> Option<HashMap<String, String>> {
    let template_segments = segments(template);
    let request_segments = segments(request_path);
    if template_segments.len() != request_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (t, r) in template_segments.iter().zip(request_segments.iter()) {
        match param_name(t) {
            Some(name) => {
                params.insert(name.to_string(), (*r).to_string());
            }
            None if t == r => {}
            None => return None,
        }
    }
    Some(params)
}
