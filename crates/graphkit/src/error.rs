//! Error types for graph operations.

use thiserror::Error;

/// Errors raised by graph construction and validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// An edge names a vertex that is not in the graph. The payload is the
    /// missing ID.
    #[error("nonexistent vertices in edges: {0}")]
    MissingVertex(String),

    /// A directed cycle was found. The payload is the cycle rendered as
    /// `a -> b -> a`.
    #[error("dependency cycle: {0}")]
    Cycle(String),

    /// A non-root vertex has no parent vertex in the graph.
    #[error("vertex without parent: {0}")]
    Orphan(String),
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, Error>;
