//! Error types for the selection and rename pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SieveError>;

/// Errors surfaced to users, grouped by the stage that raised them.
///
/// Parsing and validation errors abort a command before any write occurs;
/// during batch processing a per-document error is reported and the loop
/// continues with the next document.
#[derive(Debug, Error)]
pub enum SieveError {
    /// Unparseable selector, scrape pattern, or template.
    #[error("invalid input: {msg}")]
    Input { msg: String },

    /// Numeric bound outside `[1, N]` in a non-clipping context, or a
    /// reversed range where a forward one is required.
    #[error("page range error: {msg}")]
    Range { msg: String },

    /// Expression could not be evaluated against the document.
    #[error("evaluation error: {msg}")]
    Evaluation { msg: String },

    /// Duplicate pages found while the dedup strategy is `fail`.
    #[error("duplicate pages detected:\n{summary}")]
    Duplicate { summary: String },

    /// Output path conflict under the `fail` strategy, or the rename
    /// attempt limit was exhausted.
    #[error("file conflict: {msg}")]
    Conflict { msg: String },

    /// I/O failure from the collaborator layer, with the offending path.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SieveError {
    /// Shorthand for an [`SieveError::Input`] with a formatted message.
    pub fn input(msg: impl Into<String>) -> Self {
        SieveError::Input { msg: msg.into() }
    }

    /// Shorthand for an [`SieveError::Range`].
    pub fn range(msg: impl Into<String>) -> Self {
        SieveError::Range { msg: msg.into() }
    }

    /// Shorthand for an [`SieveError::Evaluation`].
    pub fn evaluation(msg: impl Into<String>) -> Self {
        SieveError::Evaluation { msg: msg.into() }
    }

    /// Shorthand for an [`SieveError::Conflict`].
    pub fn conflict(msg: impl Into<String>) -> Self {
        SieveError::Conflict { msg: msg.into() }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SieveError::Io {
            path: path.into(),
            source,
        }
    }
}
