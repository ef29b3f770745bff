//! Lazy two-phase template evaluation.
//!
//! Phase one runs at load time: templates are executed with a recording
//! function set so the dependency resolver can discover `param(…)` and
//! `lookup(…)` calls before any value exists. Phase two runs during
//! scheduling: each vertex is rendered with the real function set once
//! its dependencies have evaluated.

pub(crate) mod language;
mod renderer;

pub use renderer::VertexRenderer;
pub(crate) use renderer::visible_params;

use modfile::Value;

/// Convert a parsed field value to JSON for preparer decoding.
pub(crate) fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}
