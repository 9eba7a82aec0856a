//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A put with `error_if_exists` found an existing value.
    #[error("key already exists: {}", display_key(.key))]
    KeyExists {
        /// The conflicting key.
        key: Vec<u8>,
    },

    /// A delete with `error_if_missing` found nothing to delete.
    #[error("key not found: {}", display_key(.key))]
    KeyMissing {
        /// The missing key.
        key: Vec<u8>,
    },

    /// A transaction operation was called by a thread that does not own
    /// the current transaction.
    #[error("no transaction in progress on this thread")]
    NoTransaction,

    /// The transaction was rolled back because a nested scope failed.
    #[error("transaction rolled back: {0}")]
    RolledBack(String),
}

fn display_key(key: &[u8]) -> String {
    key.iter()
        .map(|b| {
            if b.is_ascii_graphic() {
                (*b as char).to_string()
            } else {
                format!("\\x{b:02x}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_rendered_readably() {
        let err = StorageError::KeyExists {
            key: b"log\x00\x01seq".to_vec(),
        };
        assert_eq!(err.to_string(), "key already exists: log\\x00\\x01seq");
    }
}
