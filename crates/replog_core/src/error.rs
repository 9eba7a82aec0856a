//! Error types for replog core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] replog_storage::StorageError),

    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An operation was called in a state where it cannot run.
    #[error("precondition failed: {message}")]
    Precondition {
        /// What was expected.
        message: String,
    },

    /// Two log entries were assigned the same sequence number.
    #[error("sequence {sequence} already exists in the change log")]
    SequenceConflict {
        /// The duplicated sequence.
        sequence: u64,
    },

    /// Entity not found.
    #[error("entity not found: {id}")]
    EntityNotFound {
        /// Primary key that was not found.
        id: String,
    },
}

impl CoreError {
    /// Creates a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}
