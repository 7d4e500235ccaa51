//! Core types for the anytrust data availability committee.
//!
//! This crate provides the data structures shared by members, the aggregator
//! and clients: content hashes, member attestations, quorum certificates,
//! committee configuration and the HTTP message bodies.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod batch_ref;
pub mod certificate;
pub mod committee;
pub mod hash;
pub mod messages;
pub mod signature;

pub use batch_ref::{BatchRef, BatchRefError, BATCH_REF_HEADER, BATCH_REF_LENGTH};
pub use certificate::{AggregateCertificate, CertificateError};
pub use committee::{
    Committee, CommitteeConfig, CommitteeError, CommitteeMember, KeySet, ALL_MEMBERS_MASK,
    MAX_COMMITTEE_SIZE,
};
pub use hash::{DataHash, HashError};
pub use messages::{BatchResponse, ErrorResponse, HealthResponse, SubmitBatchRequest};
pub use signature::MemberSignature;
