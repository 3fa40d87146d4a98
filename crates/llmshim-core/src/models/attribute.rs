//! Span attribute values

use opentelemetry::{KeyValue, Value};

/// Span attributes as ordered key/value pairs
pub type Attributes = Vec<KeyValue>;

/// Convert a JSON scalar; arrays, objects and null have no attribute form
pub fn json_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::I64)
            .or_else(|| n.as_f64().map(Value::F64)),
        serde_json::Value::String(s) => Some(Value::from(s.clone())),
        _ => None,
    }
}
