//! The task trait.

use crate::renderer::Renderer;
use crate::status::TaskStatus;
use anyhow::Result;
use std::fmt;

/// A unit of work over a target system.
///
/// `check` is read-only and may observe the system; `apply` mutates and
/// is only invoked when the preceding check reported a pending change.
/// Tasks must be safe to share across the scheduler's worker pool.
pub trait Task: Send + Sync + fmt::Debug {
    /// Compare current state against desired state.
    fn check(&self, renderer: &dyn Renderer) -> Result<TaskStatus>;

    /// Converge the system to desired state.
    fn apply(&self, renderer: &dyn Renderer) -> Result<TaskStatus>;

    /// The mutual-exclusion group this task belongs to, if any. Group
    /// members execute one at a time in ID order.
    fn group(&self) -> Option<String> {
        None
    }

    /// The evaluated value carried by `param` tasks. The engine reads
    /// this when resolving `param(…)` template calls; other kinds leave
    /// the default.
    fn param_value(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Type-erased task storage.
pub type BoxedTask = Box<dyn Task>;
