//! The render capability handed to preparers and tasks.

use crate::status::TaskStatus;
use anyhow::Result;

/// Template and value resolution, scoped to one vertex.
///
/// The engine implements this against the live task graph; resource
/// implementations only consume it.
pub trait Renderer: Send + Sync {
    /// The value seeded at a module call site, for `param` vertices.
    fn value(&self) -> Option<serde_json::Value>;

    /// Interpolate a templated string. `key` names the field being
    /// rendered so failures can point at it.
    fn render(&self, key: &str, raw: &str) -> Result<String>;

    /// The evaluated status of another vertex, addressed by graph ID.
    /// `None` until that vertex has completed its check.
    fn lookup(&self, id: &str) -> Option<TaskStatus>;
}

/// A renderer with no graph behind it: no value, no lookups, and
/// pass-through rendering. Used for meta vertices and in tests.
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn value(&self) -> Option<serde_json::Value> {
        None
    }

    fn render(&self, _key: &str, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }

    fn lookup(&self, _id: &str) -> Option<TaskStatus> {
        None
    }
}
