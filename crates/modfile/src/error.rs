//! Error types for module parsing.

use thiserror::Error;

/// Errors raised while lexing or parsing module text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid module text. Fatal at load.
    #[error("parse error at {line}:{col}: {message}")]
    Parse {
        /// 1-indexed line of the offending token
        line: usize,
        /// 1-indexed column of the offending token
        col: usize,
        message: String,
    },
}

impl Error {
    pub(crate) fn parse(line: usize, col: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            col,
            message: message.into(),
        }
    }
}

/// Result type for module parsing.
pub type Result<T> = std::result::Result<T, Error>;
