//! Inner JSON expansion for diagnostic output.

use serde_json::{Map, Value};

/// Replace every top-level string value that is itself valid JSON with the
/// parsed value. Nested values are left alone.
pub fn parse_inner_json(data: &mut Map<String, Value>) {
    for value in data.values_mut() {
        let parsed = match value {
            Value::String(s) => serde_json::from_str::<Value>(s).ok(),
            _ => None,
        };
        if let Some(parsed) = parsed {
            *value = parsed;
        }
    }
}
