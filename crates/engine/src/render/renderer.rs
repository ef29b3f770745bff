//! The per-vertex render capability.

use crate::render::language;
use anyhow::{Context, Result};
use graphkit::{Graph, id};
use minijinja::Environment;
use modfile::Node;
use resource::{Renderer, TaskStatus};
use std::collections::HashMap;

/// Renderer scoped to one vertex: resolved parameter values, evaluated
/// lookup targets, and the call-site seed for `param` vertices.
///
/// Built by the scheduler right before a vertex's prepare/check, once
/// every dependency has completed.
pub struct VertexRenderer {
    id: String,
    seeded: Option<serde_json::Value>,
    lookups: HashMap<String, TaskStatus>,
    env: Environment<'static>,
}

impl VertexRenderer {
    pub(crate) fn new(
        id: &str,
        seeded: Option<serde_json::Value>,
        params: HashMap<String, serde_json::Value>,
        lookups: HashMap<String, TaskStatus>,
    ) -> Self {
        VertexRenderer {
            id: id.to_string(),
            seeded,
            env: language::render_env(params, lookups.clone()),
            lookups,
        }
    }

    /// Evaluate a `case` predicate to a boolean.
    pub(crate) fn eval_predicate(&self, expr: &str) -> Result<bool> {
        let compiled = self
            .env
            .compile_expression_owned(expr.to_string())
            .with_context(|| format!("invalid predicate at {}", self.id))?;
        let value = compiled
            .eval(())
            .with_context(|| format!("predicate evaluation failed at {}", self.id))?;
        Ok(value.is_true())
    }
}

impl Renderer for VertexRenderer {
    fn value(&self) -> Option<serde_json::Value> {
        self.seeded.clone()
    }

    fn render(&self, key: &str, raw: &str) -> Result<String> {
        self.env
            .render_str(raw, ())
            .with_context(|| format!("render of {}.{key} failed", self.id))
    }

    fn lookup(&self, target: &str) -> Option<TaskStatus> {
        self.lookups.get(target).cloned()
    }
}

/// Resolve every parameter visible from `id`: at each ancestor scope,
/// sibling `param` vertices contribute their evaluated values, nearest
/// scope wins.
pub(crate) fn visible_params(
    graph: &Graph<Node>,
    vertex_id: &str,
    value_of: impl Fn(&str) -> Option<serde_json::Value>,
) -> HashMap<String, serde_json::Value> {
    let mut out = HashMap::new();
    let mut scope = vertex_id.to_string();
    while !id::is_root(&scope) {
        let parent = id::parent_id(&scope).to_string();
        for child_id in graph.children(&parent) {
            let Some(meta) = graph.get(&child_id) else {
                continue;
            };
            let node = meta.value();
            if node.kind() != "param" || out.contains_key(node.name()) {
                continue;
            }
            if let Some(value) = value_of(&child_id) {
                out.insert(node.name().to_string(), value);
            }
        }
        scope = parent;
    }
    out
}
