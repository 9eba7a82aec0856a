//! Error types for the sync engine.

use replog_core::CoreError;
use replog_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote answered with a non-success status. The body is kept as
    /// text and never decoded.
    #[error("transport error: status {status}: {body}")]
    Transport {
        /// Response status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request never got a response.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote store reports another identity than the persisted peer.
    #[error("remote store identity changed from {expected} to {actual}")]
    IdentityMismatch {
        /// Persisted peer identity.
        expected: String,
        /// Identity reported by the remote.
        actual: String,
    },

    /// Local repository error.
    #[error("local store error: {0}")]
    Core(#[from] CoreError),

    /// Wire encoding or decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote base URL is malformed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status,
            body: body.into(),
        }
    }

    /// Returns the remote status of a transport error.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if a later pass may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            SyncError::Connection(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport(503, "unavailable").is_retryable());
        assert!(SyncError::transport(429, "slow down").is_retryable());
        assert!(!SyncError::transport(401, "no token").is_retryable());
        assert!(SyncError::Connection("refused".into()).is_retryable());
        assert!(!SyncError::IdentityMismatch {
            expected: "a".into(),
            actual: "b".into()
        }
        .is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::transport(404, "{\"error\":\"notFound\"}");
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));

        let err = SyncError::IdentityMismatch {
            expected: "old".into(),
            actual: "new".into(),
        };
        assert!(err.to_string().contains("old"));
        assert!(err.to_string().contains("new"));
    }
}
