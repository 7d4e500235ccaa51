//! A single member's attestation of a data hash

use crate::DataHash;
use anytrust_crypto::{BlsKeyPair, BlsPublicKey, BlsSignature, DST_ATTESTATION};
use serde::{Deserialize, Serialize};

/// Proof that one member attested a [`DataHash`]
///
/// BLS signing is deterministic, so a member asked twice for the same blob
/// returns an identical value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSignature {
    /// Attested hash
    pub data_hash: DataHash,
    /// BLS signature over `data_hash` under [`DST_ATTESTATION`]
    pub signature: BlsSignature,
    /// Signer identity
    pub public_key: BlsPublicKey,
}

impl MemberSignature {
    /// Attest `data_hash` with `keypair`
    pub fn sign(data_hash: DataHash, keypair: &BlsKeyPair) -> Self {
        Self {
            data_hash,
            signature: keypair.sign_attestation(data_hash.as_bytes()),
            public_key: keypair.public_key.clone(),
        }
    }

    /// Check the signature against the advertised key
    pub fn verify(&self) -> bool {
        self.signature
            .verify(self.data_hash.as_bytes(), DST_ATTESTATION, &self.public_key)
    }
}
