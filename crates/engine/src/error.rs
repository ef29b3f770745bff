//! Error types for the execution pipeline.
//!
//! Load-time failures (parse, resolution) abort the entire run and
//! surface here. Per-vertex failures during scheduling (render, prepare,
//! check, apply) fail the vertex and skip its transitive dependents
//! instead; they are reported through [`crate::exec::Outcome`], not this
//! type.

use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid module text.
    #[error(transparent)]
    Parse(#[from] modfile::Error),

    /// Unknown dependency, parameter, or cross-reference.
    #[error("resolution error at {id}: {message}")]
    Resolution { id: String, message: String },

    /// A template failed to parse while scanning for dependencies.
    #[error("template error at {id}: {message}")]
    Template { id: String, message: String },

    /// Module structure errors: duplicate IDs, misplaced blocks, bad
    /// module calls, nesting too deep.
    #[error("load error: {0}")]
    Load(String),

    /// A module source could not be fetched.
    #[error("could not fetch module source {source_path}: {message}")]
    Fetch {
        source_path: String,
        message: String,
    },

    /// Graph invariant violation surfaced by validation.
    #[error(transparent)]
    Graph(#[from] graphkit::Error),
}

impl Error {
    pub(crate) fn resolution(id: &str, message: impl Into<String>) -> Self {
        Error::Resolution {
            id: id.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
