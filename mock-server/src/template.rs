//! Response body templating.
//!
//! Supported placeholders:
//! - `{{request.method}}`, `{{request.url}}`, `{{request.path}}`
//! - `{{request.path.[N]}}`: N-th non-empty path segment
//! - `{{request.query.NAME}}`: first decoded value of a query parameter
//! - `{{request.headers.NAME}}`
//! - `{{request.body.a.b}}`: value at a dotted path of the JSON body
//!
//! Unknown or unresolvable placeholders render as the empty string.
//!
//! A placeholder wrapped in double quotes (`"{{request.body.cast}}"`) sits
//! inside a JSON string: its value is escaped, and a JSON `null` replaces the
//! quotes as well so the result stays valid JSON.

use serde_json::Value;

use crate::journal::RecordedRequest;
use crate::stub::{lookup, render_value};

pub fn render(template: &str, request: &RecordedRequest) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let value = resolve(after[..end].trim(), request);
        rest = &after[end + 2..];

        let quoted = out.ends_with('"') && rest.starts_with('"');
        match (value, quoted) {
            (Value::Null, true) => {
                out.pop();
                out.push_str("null");
                rest = &rest[1..];
            }
            (value, true) => out.push_str(&escape(&render_value(&value))),
            (value, false) => out.push_str(&render_value(&value)),
        }
    }
    out.push_str(rest);
    out
}

/// JSON string escaping without the surrounding quotes.
fn escape(text: &str) -> String {
    let quoted = Value::String(text.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

fn resolve(expr: &str, request: &RecordedRequest) -> Value {
    let text = |s: &str| Value::String(s.to_string());
    let Some(expr) = expr.strip_prefix("request.") else {
        return text("");
    };
    match expr {
        "method" => return text(request.method.as_str()),
        "url" => return Value::String(request.url()),
        "path" => return text(request.path.as_str()),
        _ => {}
    }
    if let Some(index) = expr.strip_prefix("path.") {
        let index = index.trim_start_matches('[').trim_end_matches(']');
        return text(
            index
                .parse::<usize>()
                .ok()
                .and_then(|i| request.path.split('/').filter(|s| !s.is_empty()).nth(i))
                .unwrap_or_default(),
        );
    }
    if let Some(name) = expr.strip_prefix("query.") {
        return text(request.query_param(name).unwrap_or_default());
    }
    if let Some(name) = expr.strip_prefix("headers.") {
        return text(request.header(name).unwrap_or_default());
    }
    if let Some(path) = expr.strip_prefix("body.") {
        return serde_json::from_str::<Value>(&request.body)
            .ok()
            .and_then(|json| lookup(&json, path).cloned())
            .unwrap_or_else(|| text(""));
    }
    text("")
}
