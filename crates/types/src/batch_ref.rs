//! Compact batch reference posted to the settlement layer
//!
//! Layout (137 bytes):
//!
//! ```text
//! [header: 1][data_hash: 32][aggregate_signature: 96][signers_mask: 8, big-endian]
//! ```

use crate::committee::KeySet;
use crate::DataHash;
use anytrust_crypto::{BlsAggregateSignature, BlsError, SIGNATURE_LENGTH};
use std::fmt;
use thiserror::Error;

/// Header byte identifying a DAC batch reference
pub const BATCH_REF_HEADER: u8 = 1;

/// Encoded length in bytes
pub const BATCH_REF_LENGTH: usize = 1 + DataHash::LENGTH + SIGNATURE_LENGTH + 8;

/// Batch reference decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchRefError {
    /// Wrong encoded length
    #[error("invalid batch reference length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// Unknown header byte
    #[error("unknown batch reference header {0:#04x}")]
    UnknownHeader(u8),

    /// Signature bytes are not a valid G2 point
    #[error("invalid aggregate signature: {0}")]
    InvalidSignature(#[from] BlsError),

    /// Not valid hex
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}

/// Data hash, aggregate signature and signers mask of a certificate
#[derive(Clone, PartialEq, Eq)]
pub struct BatchRef {
    /// Certified hash
    pub data_hash: DataHash,
    /// Aggregate committee signature
    pub aggregate_signature: BlsAggregateSignature,
    /// Bit `i` set iff committee member `i` signed
    pub signers_mask: u64,
}

impl BatchRef {
    /// Serialize to the wire layout
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BATCH_REF_LENGTH);
        buf.push(BATCH_REF_HEADER);
        buf.extend_from_slice(self.data_hash.as_bytes());
        buf.extend_from_slice(&self.aggregate_signature.to_bytes());
        buf.extend_from_slice(&self.signers_mask.to_be_bytes());
        buf
    }

    /// Parse the wire layout
    pub fn decode(bytes: &[u8]) -> Result<Self, BatchRefError> {
        if bytes.len() != BATCH_REF_LENGTH {
            return Err(BatchRefError::InvalidLength {
                expected: BATCH_REF_LENGTH,
                actual: bytes.len(),
            });
        }
        if bytes[0] != BATCH_REF_HEADER {
            return Err(BatchRefError::UnknownHeader(bytes[0]));
        }

        let (hash_bytes, rest) = bytes[1..].split_at(DataHash::LENGTH);
        let (sig_bytes, mask_bytes) = rest.split_at(SIGNATURE_LENGTH);

        let mut hash = [0u8; 32];
        hash.copy_from_slice(hash_bytes);
        let mut sig = [0u8; SIGNATURE_LENGTH];
        sig.copy_from_slice(sig_bytes);
        let mut mask = [0u8; 8];
        mask.copy_from_slice(mask_bytes);

        Ok(Self {
            data_hash: DataHash::from_bytes(hash),
            aggregate_signature: BlsAggregateSignature::from_bytes(&sig)?,
            signers_mask: u64::from_be_bytes(mask),
        })
    }

    /// Hex of the encoded form
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Parse hex of the encoded form, with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, BatchRefError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| BatchRefError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Check the aggregate signature against a committee key set
    pub fn verify(&self, key_set: &KeySet) -> bool {
        key_set.verify(
            self.data_hash.as_bytes(),
            &self.aggregate_signature,
            self.signers_mask,
        )
    }
}

impl fmt::Debug for BatchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchRef")
            .field("data_hash", &self.data_hash)
            .field("signers_mask", &format_args!("{:#x}", self.signers_mask))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregateCertificate, MemberSignature};
    use anytrust_crypto::BlsKeyPair;

    fn certified(n: usize, signers: &[usize]) -> (KeySet, AggregateCertificate) {
        let kps: Vec<_> = (0..n)
            .map(|_| BlsKeyPair::generate(&mut rand::thread_rng()))
            .collect();
        let hash = DataHash::compute(b"batch");
        let atts: Vec<_> = signers
            .iter()
            .map(|&i| (i, MemberSignature::sign(hash, &kps[i])))
            .collect();
        let key_set = KeySet::new(kps.iter().map(|kp| kp.public_key.clone()).collect()).unwrap();
        (key_set, AggregateCertificate::aggregate(&atts, n).unwrap())
    }

    #[test]
    fn test_encode_layout() {
        let (_, cert) = certified(3, &[0, 2]);
        let batch_ref = cert.to_batch_ref().unwrap();
        let encoded = batch_ref.encode();

        assert_eq!(encoded.len(), BATCH_REF_LENGTH);
        assert_eq!(encoded[0], BATCH_REF_HEADER);
        assert_eq!(&encoded[1..33], cert.data_hash.as_slice());
        assert_eq!(&encoded[129..], &[0, 0, 0, 0, 0, 0, 0, 0b101]);

        assert_eq!(BatchRef::decode(&encoded).unwrap(), batch_ref);
        assert_eq!(BatchRef::from_hex(&batch_ref.to_hex()).unwrap(), batch_ref);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let (_, cert) = certified(2, &[0, 1]);
        let mut encoded = cert.to_batch_ref().unwrap().encode();

        assert_eq!(
            BatchRef::decode(&encoded[..10]),
            Err(BatchRefError::InvalidLength {
                expected: BATCH_REF_LENGTH,
                actual: 10
            })
        );

        encoded[0] = 7;
        assert_eq!(
            BatchRef::decode(&encoded),
            Err(BatchRefError::UnknownHeader(7))
        );
    }

    #[test]
    fn test_verify_against_key_set() {
        let (key_set, cert) = certified(4, &[1, 2, 3]);
        let mut batch_ref = cert.to_batch_ref().unwrap();
        assert!(batch_ref.verify(&key_set));

        batch_ref.signers_mask = 0b0111;
        assert!(!batch_ref.verify(&key_set));
    }

    #[test]
    fn test_zero_mask_means_whole_committee() {
        let (key_set, cert) = certified(3, &[0, 1, 2]);
        let mut batch_ref = cert.to_batch_ref().unwrap();
        batch_ref.signers_mask = 0;
        assert!(batch_ref.verify(&key_set));
    }
}
