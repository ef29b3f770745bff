//! Kind registry: maps resource kind strings to preparer factories.

use crate::renderer::Renderer;
use crate::task::BoxedTask;
use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A factory that turns a vertex's rendered fields into a ready-to-run
/// task.
///
/// Preparers are plain `Deserialize` structs: the engine renders a
/// vertex's fields into a JSON map, decodes the preparer from it, then
/// calls [`Preparer::prepare`].
pub trait Preparer: Send + Sync {
    /// Build the task. The renderer resolves call-site values for
    /// `param` and is available for any late interpolation.
    fn prepare(&self, renderer: &dyn Renderer) -> Result<BoxedTask>;
}

type Factory = Box<dyn Fn(serde_json::Value) -> Result<Box<dyn Preparer>> + Send + Sync>;

/// The map from kind strings to preparer factories.
///
/// Registration happens once at process start; lookups are read-only
/// afterwards.
pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Registry {
            factories: HashMap::new(),
        }
    }

    /// A registry with the kinds every module needs: currently `param`.
    /// Front-ends register their resource kinds on top.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        registry.register::<crate::param::Preparer>("param");
        registry
    }

    /// Register `kind`, decoding its preparer from rendered fields.
    pub fn register<P>(&mut self, kind: &str)
    where
        P: Preparer + DeserializeOwned + 'static,
    {
        self.factories.insert(
            kind.to_string(),
            Box::new(|fields| {
                let preparer: P = serde_json::from_value(fields)?;
                Ok(Box::new(preparer))
            }),
        );
    }

    /// Whether `kind` is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Decode and run the preparer for `kind` against rendered fields.
    pub fn prepare(
        &self,
        kind: &str,
        fields: serde_json::Value,
        renderer: &dyn Renderer,
    ) -> Result<BoxedTask> {
        let Some(factory) = self.factories.get(kind) else {
            bail!("unknown resource kind: {kind}");
        };
        let preparer = factory(fields)
            .with_context(|| format!("invalid fields for resource kind {kind}"))?;
        preparer.prepare(renderer)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
