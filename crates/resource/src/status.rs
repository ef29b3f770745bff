//! Task status and diffs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity of a check or apply outcome.
///
/// `Fatal` is equivalent to an error for dependent-skipping purposes. A
/// task may report `WillChange` with no error to request an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Level {
    /// Current state matches desired state
    #[default]
    NoChange,
    /// Apply would bring the system to desired state
    WillChange,
    /// Applying would invalidate a dependent resource
    WouldInvalidate,
    /// The resource cannot converge; dependents will be skipped
    Fatal,
}

/// A pair of observed and desired values for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub original: String,
    pub current: String,
}

impl Diff {
    pub fn new(original: impl Into<String>, current: impl Into<String>) -> Self {
        Diff {
            original: original.into(),
            current: current.into(),
        }
    }

    /// Whether the values differ.
    pub fn changes(&self) -> bool {
        self.original != self.current
    }
}

/// The outcome of a check or apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    level: Level,
    messages: Vec<String>,
    diffs: BTreeMap<String, Diff>,
}

impl TaskStatus {
    /// A status reporting the system already matches desired state.
    pub fn no_change() -> Self {
        TaskStatus::default()
    }

    /// A status requesting an apply.
    pub fn will_change() -> Self {
        TaskStatus {
            level: Level::WillChange,
            ..Default::default()
        }
    }

    /// A fatal status carrying a reason.
    pub fn fatal(reason: impl Into<String>) -> Self {
        TaskStatus {
            level: Level::Fatal,
            messages: vec![reason.into()],
            diffs: BTreeMap::new(),
        }
    }

    /// Attach a diff for `key`. Diffs whose sides differ raise the level
    /// to `WillChange` when it was `NoChange`.
    pub fn with_diff(
        mut self,
        key: impl Into<String>,
        original: impl Into<String>,
        current: impl Into<String>,
    ) -> Self {
        let diff = Diff::new(original, current);
        if diff.changes() && self.level == Level::NoChange {
            self.level = Level::WillChange;
        }
        self.diffs.insert(key.into(), diff);
        self
    }

    /// Attach a free-form message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    /// The status level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Whether this status requests an apply.
    pub fn has_changes(&self) -> bool {
        matches!(self.level, Level::WillChange | Level::WouldInvalidate)
    }

    /// Whether this status is fatal.
    pub fn is_fatal(&self) -> bool {
        self.level == Level::Fatal
    }

    /// The attached messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// The attached diffs, keyed by field.
    pub fn diffs(&self) -> &BTreeMap<String, Diff> {
        &self.diffs
    }
}
