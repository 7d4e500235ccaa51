//! Cryptographic primitives for the anytrust DAC
//!
//! This crate provides:
//! - BLS12-381 signatures for committee attestations over data hashes
//! - Signature and public key aggregation for quorum certificates
//! - Keccak-256 content hashing
//! - Domain separation between attestations and submitter signatures

pub mod bls;
pub mod error;
pub mod hash;

pub use bls::{
    BlsAggregateSignature, BlsKeyPair, BlsPublicKey, BlsSecretKey, BlsSignature,
    DST_ATTESTATION, DST_SUBMISSION, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};
pub use error::{decode_hex_array, BlsError};
pub use hash::keccak256;
