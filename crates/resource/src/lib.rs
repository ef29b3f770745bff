//! # Resource
//!
//! The contract between the batuque engine and resource implementations.
//!
//! ## Core concepts
//!
//! - **Task**: a unit of work implementing [`Task::check`] (read-only
//!   comparison of current vs desired state) and [`Task::apply`]
//!   (mutating convergence, only invoked when check reports a pending
//!   change).
//! - **TaskStatus**: the outcome of a check or apply: a [`Level`], free
//!   form messages, and a keyed set of [`Diff`]s.
//! - **Preparer**: a factory decoded from a resource's rendered fields
//!   that produces a ready-to-execute task.
//! - **Registry**: the process-wide map from kind strings
//!   (`"file.content"`, `"task"`, `"param"`) to preparer factories.
//!
//! The engine hands every preparer and task a [`Renderer`] capability for
//! template interpolation, parameter values, and cross-resource lookups;
//! implementations never touch the graph directly.

pub mod param;
pub mod registry;
pub mod renderer;
pub mod status;
pub mod task;

pub use registry::{Preparer, Registry};
pub use renderer::{NoopRenderer, Renderer};
pub use status::{Diff, Level, TaskStatus};
pub use task::{BoxedTask, Task};
