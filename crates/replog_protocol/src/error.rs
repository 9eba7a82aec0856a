//! Error types for protocol encoding and decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A JSON body could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A query parameter has an invalid value.
    #[error("invalid query parameter '{param}': {message}")]
    InvalidQuery {
        /// Parameter name.
        param: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid query parameter error.
    pub fn invalid_query(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            param: param.into(),
            message: message.into(),
        }
    }
}
