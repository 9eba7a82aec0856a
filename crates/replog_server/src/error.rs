//! Error types for the store server.

use replog_core::CoreError;
use replog_protocol::ProtocolError;
use serde::Serialize;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No usable credentials were presented.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The credentials do not allow the operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No route or resource matches.
    #[error("not found: {0}")]
    NotFound(String),

    /// The route exists but not for this method.
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Wire decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Repository or change-log error.
    #[error("repository error: {0}")]
    Core(#[from] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub(crate) error: &'a str,
    pub(crate) message: String,
}

impl ServerError {
    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Protocol(_) => 400,
            ServerError::AuthenticationFailed(_) => 401,
            ServerError::NotAuthorized(_) => 403,
            ServerError::NotFound(_) | ServerError::Core(CoreError::EntityNotFound { .. }) => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::Core(_) | ServerError::Internal(_) => 500,
        }
    }

    /// Returns a short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalidRequest",
            ServerError::AuthenticationFailed(_) => "authenticationFailed",
            ServerError::NotAuthorized(_) => "notAuthorized",
            ServerError::NotFound(_) => "notFound",
            ServerError::MethodNotAllowed { .. } => "methodNotAllowed",
            ServerError::Protocol(_) => "protocolError",
            ServerError::Core(CoreError::EntityNotFound { .. }) => "notFound",
            ServerError::Core(_) => "repositoryError",
            ServerError::Internal(_) => "internalError",
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    pub(crate) fn body(&self) -> ErrorBody<'static> {
        ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert_eq!(ServerError::AuthenticationFailed("x".into()).status_code(), 401);
        assert_eq!(ServerError::NotAuthorized("x".into()).status_code(), 403);
    }

    #[test]
    fn missing_entity_is_not_found() {
        let err = ServerError::from(CoreError::EntityNotFound { id: "p1".into() });
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.kind(), "notFound");

        let err = ServerError::from(CoreError::SequenceConflict { sequence: 3 });
        assert!(err.is_server_error());
    }

    #[test]
    fn error_body_carries_kind_and_message() {
        let err = ServerError::NotFound("/nope".into());
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "notFound");
        assert_eq!(body["message"], "not found: /nope");
    }
}
