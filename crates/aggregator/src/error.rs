//! Aggregator error types

use anytrust_crypto::BlsPublicKey;
use anytrust_types::{BatchRefError, CertificateError, DataHash};
use std::time::Duration;
use thiserror::Error;

/// Aggregator errors returned to callers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    /// Empty blob or malformed request
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer than Q members returned a usable signature
    #[error("quorum not met: {got} of {threshold} required signatures")]
    QuorumNotMet { got: usize, threshold: usize },

    /// A member attested a different hash than the submitted blob's
    #[error("hash mismatch from member {member}: expected {expected}, got {got}")]
    HashMismatch {
        member: usize,
        expected: DataHash,
        got: DataHash,
    },

    /// The aggregate signature did not verify
    #[error("aggregate signature failed verification (invalid signers: {invalid_signers:?})")]
    InvalidAggregate { invalid_signers: Vec<usize> },

    /// No member returned a usable signature
    #[error("all {count} committee members unreachable")]
    AllMembersUnreachable { count: usize },

    /// No member could serve a blob with the requested hash
    #[error("blob unavailable: {0}")]
    Unavailable(DataHash),

    /// Invalid aggregator configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl AggregatorError {
    /// Label used for metrics and the `code` field of error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            AggregatorError::InvalidInput(_) => "INVALID_INPUT",
            AggregatorError::QuorumNotMet { .. } => "QUORUM_NOT_MET",
            AggregatorError::HashMismatch { .. } => "HASH_MISMATCH",
            AggregatorError::InvalidAggregate { .. } => "INVALID_AGGREGATE",
            AggregatorError::AllMembersUnreachable { .. } => "ALL_MEMBERS_UNREACHABLE",
            AggregatorError::Unavailable(_) => "UNAVAILABLE",
            AggregatorError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Failure of a single member call; recovered locally by the aggregator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemberClientError {
    /// Transport failure (connection refused, reset, DNS)
    #[error("member unreachable: {0}")]
    Unreachable(String),

    /// No answer within the per-member timeout
    #[error("member timed out after {0:?}")]
    Timeout(Duration),

    /// Member answered with an error status
    #[error("member rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Member does not hold the requested blob
    #[error("blob not found on member")]
    NotFound,

    /// Response body could not be decoded
    #[error("invalid member response: {0}")]
    InvalidResponse(String),

    /// Member signed with a key other than its configured identity
    #[error("member identity mismatch: expected {expected:?}, got {got:?}")]
    IdentityMismatch {
        expected: BlsPublicKey,
        got: BlsPublicKey,
    },

    /// Another member already answered with this public key
    #[error("public key {0:?} already used by member {1}")]
    DuplicateIdentity(BlsPublicKey, usize),
}

impl MemberClientError {
    /// Label used for the per-member failure metric
    pub fn reason(&self) -> &'static str {
        match self {
            MemberClientError::Unreachable(_) => "unreachable",
            MemberClientError::Timeout(_) => "timeout",
            MemberClientError::Rejected { .. } => "rejected",
            MemberClientError::NotFound => "not_found",
            MemberClientError::InvalidResponse(_) => "invalid_response",
            MemberClientError::IdentityMismatch { .. } => "identity_mismatch",
            MemberClientError::DuplicateIdentity(..) => "duplicate_identity",
        }
    }
}

/// Errors of the rollup-side [`DacClient`](crate::DacClient)
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request could not be sent or the response not read
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Aggregator answered with an error status
    #[error("aggregator returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Empty blob
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Certified or returned data does not match the expected hash
    #[error("hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: DataHash, got: DataHash },

    /// Certificate does not verify against the client's committee key set
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Certificate has fewer signers than the client requires
    #[error("certificate has {got} signers, {required} required")]
    InsufficientSigners { got: usize, required: usize },

    /// Certificate could not be encoded as a batch reference
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// Malformed batch reference
    #[error("batch reference error: {0}")]
    BatchRef(#[from] BatchRefError),
}

/// Result type for aggregator operations
pub type Result<T> = std::result::Result<T, AggregatorError>;
