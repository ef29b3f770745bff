//! The `param` resource.
//!
//! Params control the flow of values through module calls. Use the
//! `{{ param('name') }}` template call anywhere the value of a param is
//! needed inside the current module.

use crate::registry;
use crate::renderer::Renderer;
use crate::status::TaskStatus;
use crate::task::{BoxedTask, Task};
use anyhow::{Result, bail};
use serde::Deserialize;

/// Preparer for params.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preparer {
    /// Optional default used when no value is provided at the call site.
    /// A param without a default is required.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl registry::Preparer for Preparer {
    fn prepare(&self, renderer: &dyn Renderer) -> Result<BoxedTask> {
        if let Some(value) = renderer.value() {
            return Ok(Box::new(Param { value }));
        }
        match &self.default {
            Some(default) => Ok(Box::new(Param {
                value: default.clone(),
            })),
            None => bail!("param is required"),
        }
    }
}

/// A value carrier. Checking or applying a param never changes the
/// target system.
#[derive(Debug, Clone)]
pub struct Param {
    value: serde_json::Value,
}

impl Param {
    /// The evaluated value.
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl Task for Param {
    fn check(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        Ok(TaskStatus::no_change())
    }

    fn apply(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        Ok(TaskStatus::no_change())
    }

    fn param_value(&self) -> Option<serde_json::Value> {
        Some(self.value.clone())
    }
}
