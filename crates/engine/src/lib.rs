//! # Engine
//!
//! The graph-based execution pipeline: module text is loaded and parsed
//! into a containment graph, dependency resolution wires the full task
//! DAG, and the scheduler walks it concurrently in two phases (`Plan`
//! checks, `Apply` enforces) while streaming per-vertex status events.
//!
//! ```text
//! text -> parse tree -> raw graph -> wired graph -> plan -> apply
//!            modfile      load        load::resolve    exec     exec
//! ```
//!
//! Template rendering is lazy and interleaved with scheduling: a vertex
//! is rendered right before its check runs, once all of its dependencies
//! have completed, so `param(…)` and `lookup(…)` calls observe evaluated
//! upstream values.

pub mod error;
pub mod events;
pub mod exec;
pub mod load;
pub mod render;

pub use error::{Error, Result};
pub use events::{
    ChannelSink, Details, DiffResponse, EventSink, NullSink, Run, Stage, StatusResponse, VecSink,
};
pub use exec::{CancelToken, ExecOpts, Outcome, RunResult, RunSummary, SkipReason, apply, plan};
pub use load::{ContentFetcher, DirFetcher, MapFetcher, load_file, load_source};
