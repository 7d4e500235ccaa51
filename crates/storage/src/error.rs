//! Storage error types

use anytrust_types::DataHash;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record blob does not hash to its key
    #[error("record hash mismatch: key {key}, blob hashes to {actual}")]
    HashMismatch {
        /// Key the record was stored or requested under
        key: DataHash,
        /// Hash of the blob it contains
        actual: DataHash,
    },

    /// Database backend error
    #[error("database error: {0}")]
    Database(String),

    /// Blocking storage task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

macro_rules! impl_from_redb {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for StorageError {
                fn from(e: $err) -> Self {
                    StorageError::Database(e.to_string())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
