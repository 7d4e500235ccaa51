//! Member error types

use anytrust_storage::StorageError;
use anytrust_types::DataHash;
use thiserror::Error;

/// Member service errors
#[derive(Debug, Error)]
pub enum MemberError {
    /// Empty blob or malformed request
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Submitter signature missing or invalid
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No record for the requested hash
    #[error("blob not found: {0}")]
    NotFound(DataHash),

    /// Persistence failed after all retries
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl MemberError {
    /// Label used for metrics and the `code` field of error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            MemberError::InvalidInput(_) => "INVALID_INPUT",
            MemberError::Unauthorized(_) => "UNAUTHORIZED",
            MemberError::NotFound(_) => "NOT_FOUND",
            MemberError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Result type for member operations
pub type Result<T> = std::result::Result<T, MemberError>;
