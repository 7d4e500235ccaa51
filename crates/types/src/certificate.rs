//! Quorum certificate over a data hash
//!
//! Produced by the aggregator from Q member attestations. Contains one
//! aggregated BLS signature plus a bitmap of which committee members signed.

use crate::batch_ref::BatchRef;
use crate::committee::{KeySet, MAX_COMMITTEE_SIZE};
use crate::{DataHash, MemberSignature};
use anytrust_crypto::{
    BlsAggregateSignature, BlsError, BlsPublicKey, BlsSignature, DST_ATTESTATION,
};
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Certificate construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// No attestations given
    #[error("no attestations to aggregate")]
    Empty,

    /// Attestations disagree on the hash
    #[error("attestation hash mismatch: expected {expected}, got {got}")]
    HashMismatch {
        /// Hash of the first attestation
        expected: DataHash,
        /// Diverging hash
        got: DataHash,
    },

    /// Signer index outside the committee
    #[error("signer index {index} outside committee of {size}")]
    SignerOutOfRange {
        /// Offending index
        index: usize,
        /// Committee size
        size: usize,
    },

    /// Same signer index given twice
    #[error("duplicate signer index {0}")]
    DuplicateSigner(usize),

    /// Signers cannot be expressed as a `u64` mask
    #[error("signer index {0} does not fit a 64-bit mask")]
    MaskOverflow(usize),

    /// Signature aggregation failed
    #[error("aggregation failed: {0}")]
    Crypto(#[from] BlsError),
}

/// Aggregated attestation of a data hash by a quorum of the committee
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCertificate {
    /// Agreed data hash
    pub data_hash: DataHash,
    /// Sum of the included signatures
    pub aggregate_signature: BlsAggregateSignature,
    /// Included public keys, in committee order
    pub public_keys: Vec<BlsPublicKey>,
    /// Included individual signatures, aligned with `public_keys`
    pub signatures: Vec<BlsSignature>,
    /// Bit `i` set iff committee member `i` is included
    #[serde(with = "bitvec_serde")]
    pub signers: BitVec<u8, Lsb0>,
}

impl AggregateCertificate {
    /// Aggregate attestations given with their committee indices.
    ///
    /// The result is not verified; call [`verify`](Self::verify).
    pub fn aggregate(
        attestations: &[(usize, MemberSignature)],
        committee_size: usize,
    ) -> Result<Self, CertificateError> {
        let first = attestations.first().ok_or(CertificateError::Empty)?;
        let data_hash = first.1.data_hash;

        let mut sorted: Vec<&(usize, MemberSignature)> = attestations.iter().collect();
        sorted.sort_by_key(|(index, _)| *index);

        let mut signers = bitvec![u8, Lsb0; 0; committee_size];
        let mut public_keys = Vec::with_capacity(sorted.len());
        let mut signatures = Vec::with_capacity(sorted.len());

        for (index, att) in sorted {
            if att.data_hash != data_hash {
                return Err(CertificateError::HashMismatch {
                    expected: data_hash,
                    got: att.data_hash,
                });
            }
            if *index >= committee_size {
                return Err(CertificateError::SignerOutOfRange {
                    index: *index,
                    size: committee_size,
                });
            }
            if signers[*index] {
                return Err(CertificateError::DuplicateSigner(*index));
            }
            signers.set(*index, true);
            public_keys.push(att.public_key.clone());
            signatures.push(att.signature.clone());
        }

        let sig_refs: Vec<&BlsSignature> = signatures.iter().collect();
        let aggregate_signature = BlsAggregateSignature::aggregate(&sig_refs)?;

        Ok(Self {
            data_hash,
            aggregate_signature,
            public_keys,
            signatures,
            signers,
        })
    }

    /// Verify the aggregate against the included public keys
    pub fn verify(&self) -> bool {
        if self.public_keys.is_empty()
            || self.public_keys.len() != self.signatures.len()
            || self.public_keys.len() != self.signer_count()
        {
            return false;
        }

        let keys: Vec<&BlsPublicKey> = self.public_keys.iter().collect();
        self.aggregate_signature
            .verify_same_message(self.data_hash.as_bytes(), DST_ATTESTATION, &keys)
    }

    /// Verify using the signers bitmap and an independently held key set,
    /// ignoring the keys embedded in the certificate
    pub fn verify_with_key_set(&self, key_set: &KeySet) -> bool {
        if self.signers.len() > key_set.len() && self.signers[key_set.len()..].any() {
            return false;
        }

        let keys: Vec<&BlsPublicKey> = self
            .signer_indices()
            .into_iter()
            .filter_map(|i| key_set.get(i))
            .collect();

        if keys.is_empty() {
            return false;
        }

        self.aggregate_signature
            .verify_same_message(self.data_hash.as_bytes(), DST_ATTESTATION, &keys)
    }

    /// Individually verify each included signature; returns the committee
    /// indices of the ones that fail
    pub fn invalid_signers(&self) -> Vec<usize> {
        self.signer_indices()
            .into_iter()
            .zip(self.public_keys.iter().zip(self.signatures.iter()))
            .filter(|(_, (key, sig))| !sig.verify(self.data_hash.as_bytes(), DST_ATTESTATION, key))
            .map(|(index, _)| index)
            .collect()
    }

    /// Count of signers
    pub fn signer_count(&self) -> usize {
        self.signers.count_ones()
    }

    /// Check if member at index is included
    pub fn has_signed(&self, index: usize) -> bool {
        self.signers.get(index).map(|b| *b).unwrap_or(false)
    }

    /// Indices of included members
    pub fn signer_indices(&self) -> Vec<usize> {
        self.signers.iter_ones().collect()
    }

    /// Signers as a `u64` mask (bit `i` = member `i`)
    pub fn signers_mask(&self) -> Result<u64, CertificateError> {
        self.signer_indices().into_iter().try_fold(0u64, |mask, i| {
            if i >= MAX_COMMITTEE_SIZE {
                Err(CertificateError::MaskOverflow(i))
            } else {
                Ok(mask | (1u64 << i))
            }
        })
    }

    /// Compact reference for posting on a settlement layer
    pub fn to_batch_ref(&self) -> Result<BatchRef, CertificateError> {
        Ok(BatchRef {
            data_hash: self.data_hash,
            aggregate_signature: self.aggregate_signature.clone(),
            signers_mask: self.signers_mask()?,
        })
    }
}

/// Serde support for BitVec
mod bitvec_serde {
    use bitvec::prelude::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bitvec: &BitVec<u8, Lsb0>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes: Vec<u8> = bitvec.as_raw_slice().to_vec();
        let len = bitvec.len();
        (len, bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec<u8, Lsb0>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (len, bytes): (usize, Vec<u8>) = Deserialize::deserialize(deserializer)?;
        if len > bytes.len() * 8 {
            return Err(serde::de::Error::custom("bitmap length exceeds data"));
        }
        let mut bv = BitVec::<u8, Lsb0>::from_vec(bytes);
        bv.truncate(len);
        Ok(bv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anytrust_crypto::BlsKeyPair;

    fn keypairs(n: usize) -> Vec<BlsKeyPair> {
        (0..n)
            .map(|_| BlsKeyPair::generate(&mut rand::thread_rng()))
            .collect()
    }

    fn attest(kps: &[BlsKeyPair], indices: &[usize], data: &[u8]) -> Vec<(usize, MemberSignature)> {
        let hash = DataHash::compute(data);
        indices
            .iter()
            .map(|&i| (i, MemberSignature::sign(hash, &kps[i])))
            .collect()
    }

    #[test]
    fn test_aggregate_and_verify() {
        let kps = keypairs(4);
        let atts = attest(&kps, &[0, 1, 2, 3], b"blob");

        let cert = AggregateCertificate::aggregate(&atts, 4).unwrap();
        assert_eq!(cert.signer_count(), 4);
        assert_eq!(cert.public_keys.len(), 4);
        assert_eq!(cert.signatures.len(), 4);
        assert!(cert.verify());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let kps = keypairs(4);
        let mut atts = attest(&kps, &[3, 0, 2], b"blob");
        let cert_a = AggregateCertificate::aggregate(&atts, 4).unwrap();
        atts.reverse();
        let cert_b = AggregateCertificate::aggregate(&atts, 4).unwrap();

        assert_eq!(cert_a, cert_b);
        assert_eq!(cert_a.signer_indices(), vec![0, 2, 3]);
        assert_eq!(cert_a.public_keys[0], kps[0].public_key);
        assert!(!cert_a.has_signed(1));
    }

    #[test]
    fn test_hash_mismatch_rejected() {
        let kps = keypairs(3);
        let mut atts = attest(&kps, &[0, 1], b"blob");
        atts.extend(attest(&kps, &[2], b"other"));

        assert!(matches!(
            AggregateCertificate::aggregate(&atts, 3),
            Err(CertificateError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_indices_rejected() {
        let kps = keypairs(3);
        let atts = attest(&kps, &[0, 0], b"blob");
        assert_eq!(
            AggregateCertificate::aggregate(&atts, 3),
            Err(CertificateError::DuplicateSigner(0))
        );

        let atts = attest(&kps, &[2], b"blob");
        assert_eq!(
            AggregateCertificate::aggregate(&atts, 2),
            Err(CertificateError::SignerOutOfRange { index: 2, size: 2 })
        );

        assert_eq!(
            AggregateCertificate::aggregate(&[], 3),
            Err(CertificateError::Empty)
        );
    }

    #[test]
    fn test_verify_fails_on_swapped_key() {
        let kps = keypairs(3);
        let atts = attest(&kps, &[0, 1], b"blob");
        let mut cert = AggregateCertificate::aggregate(&atts, 3).unwrap();
        cert.public_keys[1] = kps[2].public_key.clone();
        assert!(!cert.verify());
    }

    #[test]
    fn test_invalid_signers_identifies_forgery() {
        let kps = keypairs(3);
        let hash = DataHash::compute(b"blob");
        let mut forged = MemberSignature::sign(hash, &kps[1]);
        forged.signature = kps[1].sign_attestation(b"something else");

        let atts = vec![
            (0, MemberSignature::sign(hash, &kps[0])),
            (1, forged),
            (2, MemberSignature::sign(hash, &kps[2])),
        ];
        let cert = AggregateCertificate::aggregate(&atts, 3).unwrap();
        assert!(!cert.verify());
        assert_eq!(cert.invalid_signers(), vec![1]);
    }

    #[test]
    fn test_verify_with_key_set() {
        let kps = keypairs(4);
        let key_set = KeySet::new(kps.iter().map(|kp| kp.public_key.clone()).collect()).unwrap();
        let atts = attest(&kps, &[1, 2, 3], b"blob");
        let mut cert = AggregateCertificate::aggregate(&atts, 4).unwrap();

        assert!(cert.verify_with_key_set(&key_set));

        // Lying about the signers breaks verification against the real key set
        cert.signers.set(0, true);
        cert.signers.set(3, false);
        assert!(!cert.verify_with_key_set(&key_set));
    }

    #[test]
    fn test_signers_mask() {
        let kps = keypairs(5);
        let atts = attest(&kps, &[0, 2, 4], b"blob");
        let cert = AggregateCertificate::aggregate(&atts, 5).unwrap();
        assert_eq!(cert.signers_mask().unwrap(), 0b10101);
    }

    #[test]
    fn test_json_roundtrip() {
        let kps = keypairs(3);
        let atts = attest(&kps, &[0, 2], b"blob");
        let cert = AggregateCertificate::aggregate(&atts, 3).unwrap();

        let json = serde_json::to_string(&cert).unwrap();
        let decoded: AggregateCertificate = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, cert);
        assert!(decoded.verify());
    }
}
