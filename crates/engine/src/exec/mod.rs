//! Concurrent plan/apply traversal.
//!
//! Both phases walk the task DAG bottom-up: a vertex becomes eligible
//! once every vertex it depends on has completed. Independent vertices
//! run in parallel on a bounded worker pool; group serialization was
//! already encoded as ordinary edges, so the scheduler needs no special
//! grouping logic at runtime.

mod scheduler;

pub use scheduler::{apply, plan};

use graphkit::{Graph, NodeValue};
use resource::{Task, TaskStatus};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Options for a plan or apply run.
#[derive(Debug, Clone)]
pub struct ExecOpts {
    /// Number of parallel workers.
    pub jobs: usize,
}

impl Default for ExecOpts {
    fn default() -> Self {
        ExecOpts { jobs: 4 }
    }
}

/// Cooperative cancellation signal shared between the caller and the
/// scheduler. Once cancelled, no further task work is dispatched and
/// remaining vertices report `Skipped(cancelled)`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a vertex was skipped without executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// A vertex this one depends on failed or was itself skipped.
    FailedDependency(String),
    /// The vertex sits inside a conditional branch that was not taken.
    BranchNotTaken,
    /// The run was cancelled before the vertex became eligible.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FailedDependency(id) => write!(f, "failed dependency {id}"),
            SkipReason::BranchNotTaken => write!(f, "branch not taken"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The engine-assigned outcome of one vertex in one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The task (or meta vertex) evaluated to a status.
    Status(TaskStatus),
    /// Render, prepare, check, or apply returned an error.
    Errored(String),
    /// Never executed.
    Skipped(SkipReason),
}

impl Outcome {
    /// Whether this outcome fails the vertex. `Fatal` statuses are
    /// equivalent to errors for dependent-skipping purposes.
    pub fn is_failed(&self) -> bool {
        match self {
            Outcome::Errored(_) => true,
            Outcome::Status(status) => status.is_fatal(),
            Outcome::Skipped(_) => false,
        }
    }

    /// Whether dependents of this vertex must be skipped.
    pub fn blocks_dependents(&self) -> bool {
        self.is_failed() || matches!(self, Outcome::Skipped(_))
    }

    /// The evaluated status, when there is one.
    pub fn status(&self) -> Option<&TaskStatus> {
        match self {
            Outcome::Status(status) => Some(status),
            _ => None,
        }
    }
}

/// A vertex's result: its outcome plus the prepared task, kept so a
/// following apply stage can reuse it without re-rendering.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub outcome: Outcome,
    pub task: Option<Arc<dyn Task>>,
}

impl RunResult {
    pub(crate) fn new(outcome: Outcome, task: Option<Arc<dyn Task>>) -> Self {
        RunResult { outcome, task }
    }
}

impl NodeValue for RunResult {
    fn group(&self) -> Option<String> {
        self.task.as_ref().and_then(|t| t.group())
    }
}

/// Aggregate counts over a finished stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub no_change: usize,
    pub changed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Tally every vertex of a result graph.
    pub fn from_graph(graph: &Graph<RunResult>) -> Self {
        let mut summary = RunSummary::default();
        for node in graph.nodes() {
            summary.add(&node.value().outcome);
        }
        summary
    }

    /// Add one outcome to the tally.
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            _ if outcome.is_failed() => self.failed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Status(status) if status.has_changes() => self.changed += 1,
            _ => self.no_change += 1,
        }
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.no_change += other.no_change;
        self.changed += other.changed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// A run succeeds iff no vertex failed; skipped-only runs count as
    /// success.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of vertices tallied.
    pub fn total(&self) -> usize {
        self.no_change + self.changed + self.failed + self.skipped
    }
}
