//! Console framing and diagnostic rendering.

use serde::Serialize;
use serde_json::Value;

use crate::invoke::InvokeResponseError;
use crate::normalize::parse_inner_json;

const DIVIDER_WIDTH: usize = 75;

/// Section boundary printed between requests and invocations.
pub fn divider() -> String {
    "-".repeat(DIVIDER_WIDTH)
}

/// Serialize with a four-space indent.
pub fn pretty<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Pretty-print a JSON payload, expanding inner JSON strings of a top-level
/// object when `parse_json` is set. `None` when the payload is not JSON.
pub fn render_payload(payload: &[u8], parse_json: bool) -> Option<String> {
    let mut value: Value = serde_json::from_slice(payload).ok()?;
    if parse_json {
        if let Value::Object(map) = &mut value {
            parse_inner_json(map);
        }
    }
    pretty(&value).ok()
}

/// Message followed by one tab-indented `path:line - label` line per frame.
pub fn render_remote_error(error: &InvokeResponseError) -> String {
    let mut out = error.message.clone();
    for frame in &error.stack_trace {
        out.push_str(&format!("\n\t{}:{} - {}", frame.path, frame.line, frame.label));
    }
    out
}
