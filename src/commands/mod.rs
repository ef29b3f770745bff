pub mod apply;
pub mod graph;
pub mod plan;
pub mod validate;

use modfile::Value;

/// Convert CLI `name=value` pairs into loader param seeds.
pub fn param_overrides(params: &[(String, String)]) -> Vec<(String, Value)> {
    params
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.clone())))
        .collect()
}
