//! BLS12-381 cryptographic operations for committee attestations
//!
//! This module provides BLS12-381 signatures with:
//! - Domain separation tags for data-hash attestations and submitter signatures
//! - Same-message signature aggregation for quorum certificates
//! - Public key aggregation over a subset of the committee
//! - min_pk variant (48-byte public keys in G1, 96-byte signatures in G2)

use crate::error::{decode_hex_array, BlsError};
use blst::min_pk::{
    AggregatePublicKey as BlstAggPubKey, AggregateSignature as BlstAggSig,
    PublicKey as BlstPubKey, SecretKey as BlstSecKey, Signature as BlstSig,
};
use blst::BLST_ERROR;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Domain separation tag for data-hash attestations.
///
/// This is the standard `NUL` ciphersuite tag, so certificates can be checked
/// by any BLS12-381 implementation that follows the IETF draft.
pub const DST_ATTESTATION: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Domain separation tag for submitter (batcher) signatures
pub const DST_SUBMISSION: &[u8] = b"ANYTRUST_DAC_SUBMISSION_V1";

/// Compressed public key length
pub const PUBLIC_KEY_LENGTH: usize = 48;

/// Compressed signature length
pub const SIGNATURE_LENGTH: usize = 96;

/// BLS12-381 secret key (32 bytes)
#[derive(Clone)]
pub struct BlsSecretKey(BlstSecKey);

impl BlsSecretKey {
    /// Generate a new random secret key
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 32];
        rng.fill_bytes(&mut ikm);
        Self::from_seed(&ikm)
    }

    /// Derive from seed bytes (32 bytes, uses key derivation)
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        // key_gen only rejects inputs shorter than 32 bytes
        let sk = BlstSecKey::key_gen(seed, &[]).expect("seed is valid length");
        Self(sk)
    }

    /// Load from raw bytes (32 bytes big-endian scalar)
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, BlsError> {
        BlstSecKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| BlsError::InvalidSecretKey)
    }

    /// Load from a hex string, with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, BlsError> {
        Self::from_bytes(&decode_hex_array::<32>(s)?)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey(self.0.sk_to_pk())
    }

    /// Sign a message with domain separation
    pub fn sign(&self, msg: &[u8], dst: &[u8]) -> BlsSignature {
        BlsSignature(self.0.sign(msg, dst, &[]))
    }
}

impl std::fmt::Debug for BlsSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlsSecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// BLS12-381 public key (48 bytes compressed)
#[derive(Clone, PartialEq, Eq)]
pub struct BlsPublicKey(BlstPubKey);

impl BlsPublicKey {
    /// Load from bytes (48 bytes compressed)
    ///
    /// The point is subgroup-checked and rejected if it is the identity.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> Result<Self, BlsError> {
        BlstPubKey::key_validate(bytes)
            .map(Self)
            .map_err(|_| BlsError::InvalidPublicKey)
    }

    /// Load from a hex string, with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, BlsError> {
        Self::from_bytes(&decode_hex_array::<PUBLIC_KEY_LENGTH>(s)?)
    }

    /// Serialize to bytes (48 bytes compressed)
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Hex encoding of the compressed key
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify a signature
    pub fn verify(&self, msg: &[u8], dst: &[u8], sig: &BlsSignature) -> bool {
        sig.verify(msg, dst, self)
    }

    /// Sum a set of public keys into one aggregate key.
    ///
    /// A same-message aggregate signature verifies against the result exactly
    /// when it verifies against the individual keys.
    pub fn aggregate(pubkeys: &[&BlsPublicKey]) -> Result<Self, BlsError> {
        if pubkeys.is_empty() {
            return Err(BlsError::EmptyAggregation);
        }

        let pks: Vec<&BlstPubKey> = pubkeys.iter().map(|p| &p.0).collect();
        BlstAggPubKey::aggregate(&pks, false)
            .map(|agg| Self(agg.to_public_key()))
            .map_err(|_| BlsError::AggregationFailed)
    }
}

impl std::hash::Hash for BlsPublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl std::fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "BlsPublicKey({})", hex::encode(&bytes[..8]))
    }
}

/// BLS12-381 signature (96 bytes)
#[derive(Clone)]
pub struct BlsSignature(BlstSig);

impl BlsSignature {
    /// Load from bytes (96 bytes)
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LENGTH]) -> Result<Self, BlsError> {
        BlstSig::from_bytes(bytes)
            .map(Self)
            .map_err(|_| BlsError::InvalidSignature)
    }

    /// Load from a hex string, with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, BlsError> {
        Self::from_bytes(&decode_hex_array::<SIGNATURE_LENGTH>(s)?)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.0.to_bytes()
    }

    /// Hex encoding of the compressed signature
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify signature against public key
    pub fn verify(&self, msg: &[u8], dst: &[u8], pubkey: &BlsPublicKey) -> bool {
        self.0.verify(true, msg, dst, &[], &pubkey.0, true) == BLST_ERROR::BLST_SUCCESS
    }
}

impl std::fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "BlsSignature({})", hex::encode(&bytes[..8]))
    }
}

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsSignature {}

/// Aggregated BLS12-381 signature
#[derive(Clone)]
pub struct BlsAggregateSignature(BlstAggSig);

impl BlsAggregateSignature {
    /// Aggregate multiple signatures into one.
    ///
    /// Aggregation is point addition in G2, so the input order does not
    /// change the result. Only same-message aggregates can be verified.
    pub fn aggregate(signatures: &[&BlsSignature]) -> Result<Self, BlsError> {
        if signatures.is_empty() {
            return Err(BlsError::EmptyAggregation);
        }

        let sigs: Vec<&BlstSig> = signatures.iter().map(|s| &s.0).collect();
        BlstAggSig::aggregate(&sigs, true)
            .map(Self)
            .map_err(|_| BlsError::AggregationFailed)
    }

    /// Verify against the individual public keys of every signer.
    /// All signers must have signed the same message.
    pub fn verify_same_message(&self, msg: &[u8], dst: &[u8], pubkeys: &[&BlsPublicKey]) -> bool {
        if pubkeys.is_empty() {
            return false;
        }

        let pks: Vec<&BlstPubKey> = pubkeys.iter().map(|p| &p.0).collect();
        let sig = self.0.to_signature();
        sig.fast_aggregate_verify(true, msg, dst, &pks) == BLST_ERROR::BLST_SUCCESS
    }

    /// Verify against an already aggregated public key
    pub fn verify_aggregate_key(&self, msg: &[u8], dst: &[u8], aggregate_key: &BlsPublicKey) -> bool {
        self.to_signature().verify(msg, dst, aggregate_key)
    }

    /// Convert to final signature
    pub fn to_signature(&self) -> BlsSignature {
        BlsSignature(self.0.to_signature())
    }

    /// Load from bytes (96 bytes)
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LENGTH]) -> Result<Self, BlsError> {
        let sig = BlstSig::from_bytes(bytes).map_err(|_| BlsError::InvalidSignature)?;
        Ok(Self(BlstAggSig::from_signature(&sig)))
    }

    /// Load from a hex string, with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, BlsError> {
        Self::from_bytes(&decode_hex_array::<SIGNATURE_LENGTH>(s)?)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.0.to_signature().to_bytes()
    }
}

impl std::fmt::Debug for BlsAggregateSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "BlsAggregateSignature({})", hex::encode(&bytes[..8]))
    }
}

impl PartialEq for BlsAggregateSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsAggregateSignature {}

/// Hex string in human-readable formats, fixed-size tuple (no length prefix)
/// in binary formats.
macro_rules! impl_fixed_bytes_serde {
    ($ty:ty, $len:expr, $what:literal) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                use serde::ser::SerializeTuple;

                let bytes = self.to_bytes();
                if serializer.is_human_readable() {
                    serializer.serialize_str(&hex::encode(bytes))
                } else {
                    let mut tuple = serializer.serialize_tuple($len)?;
                    for byte in bytes {
                        tuple.serialize_element(&byte)?;
                    }
                    tuple.end()
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                use serde::de::{Error, SeqAccess, Visitor};

                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    return Self::from_hex(&s).map_err(D::Error::custom);
                }

                struct ArrayVisitor;

                impl<'de> Visitor<'de> for ArrayVisitor {
                    type Value = [u8; $len];

                    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                        write!(formatter, "{} bytes of {}", $len, $what)
                    }

                    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
                    where
                        A: SeqAccess<'de>,
                    {
                        let mut arr = [0u8; $len];
                        for (i, byte) in arr.iter_mut().enumerate() {
                            *byte = seq
                                .next_element()?
                                .ok_or_else(|| A::Error::invalid_length(i, &self))?;
                        }
                        Ok(arr)
                    }
                }

                let arr = deserializer.deserialize_tuple($len, ArrayVisitor)?;
                Self::from_bytes(&arr).map_err(D::Error::custom)
            }
        }
    };
}

impl_fixed_bytes_serde!(BlsPublicKey, PUBLIC_KEY_LENGTH, "public key");
impl_fixed_bytes_serde!(BlsSignature, SIGNATURE_LENGTH, "signature");
impl_fixed_bytes_serde!(BlsAggregateSignature, SIGNATURE_LENGTH, "aggregate signature");

/// BLS key pair (convenience wrapper)
#[derive(Clone)]
pub struct BlsKeyPair {
    pub secret_key: BlsSecretKey,
    pub public_key: BlsPublicKey,
}

impl BlsKeyPair {
    /// Generate a new random key pair
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self::from_secret_key(BlsSecretKey::generate(rng))
    }

    /// Create from secret key
    pub fn from_secret_key(secret_key: BlsSecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            secret_key,
            public_key,
        }
    }

    /// Attest to a data hash
    pub fn sign_attestation(&self, data_hash: &[u8]) -> BlsSignature {
        self.secret_key.sign(data_hash, DST_ATTESTATION)
    }

    /// Sign a submission as the batch submitter
    pub fn sign_submission(&self, data_hash: &[u8]) -> BlsSignature {
        self.secret_key.sign(data_hash, DST_SUBMISSION)
    }
}

impl std::fmt::Debug for BlsKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlsKeyPair")
            .field("public_key", &self.public_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypairs(n: usize) -> Vec<BlsKeyPair> {
        (0..n)
            .map(|_| BlsKeyPair::generate(&mut rand::thread_rng()))
            .collect()
    }

    #[test]
    fn test_key_roundtrip() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let restored = BlsPublicKey::from_bytes(&keypair.public_key.to_bytes()).unwrap();
        assert_eq!(keypair.public_key, restored);

        let secret = BlsSecretKey::from_hex(&hex::encode(keypair.secret_key.to_bytes())).unwrap();
        assert_eq!(secret.public_key(), keypair.public_key);
    }

    #[test]
    fn test_sign_verify_attestation() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let msg = [7u8; 32];
        let sig = keypair.sign_attestation(&msg);
        assert!(keypair.public_key.verify(&msg, DST_ATTESTATION, &sig));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let msg = [1u8; 32];
        assert_eq!(keypair.sign_attestation(&msg), keypair.sign_attestation(&msg));
    }

    #[test]
    fn test_domain_separation() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let msg = b"same message";

        let submission = keypair.sign_submission(msg);
        assert!(!keypair.public_key.verify(msg, DST_ATTESTATION, &submission));
        assert!(keypair.public_key.verify(msg, DST_SUBMISSION, &submission));
    }

    #[test]
    fn test_signature_aggregation() {
        let keypairs = keypairs(5);
        let msg = b"same message for all";
        let sigs: Vec<_> = keypairs.iter().map(|kp| kp.sign_attestation(msg)).collect();
        let sig_refs: Vec<_> = sigs.iter().collect();

        let agg = BlsAggregateSignature::aggregate(&sig_refs).unwrap();

        let pubkeys: Vec<_> = keypairs.iter().map(|kp| &kp.public_key).collect();
        assert!(agg.verify_same_message(msg, DST_ATTESTATION, &pubkeys));

        let agg_key = BlsPublicKey::aggregate(&pubkeys).unwrap();
        assert!(agg.verify_aggregate_key(msg, DST_ATTESTATION, &agg_key));
    }

    #[test]
    fn test_aggregation_order_independent() {
        let keypairs = keypairs(3);
        let msg = b"ordering";
        let sigs: Vec<_> = keypairs.iter().map(|kp| kp.sign_attestation(msg)).collect();

        let forward = BlsAggregateSignature::aggregate(&[&sigs[0], &sigs[1], &sigs[2]]).unwrap();
        let reverse = BlsAggregateSignature::aggregate(&[&sigs[2], &sigs[0], &sigs[1]]).unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_aggregate_wrong_message() {
        let keypairs = keypairs(3);
        let sigs: Vec<_> = keypairs
            .iter()
            .map(|kp| kp.sign_attestation(b"correct message"))
            .collect();
        let sig_refs: Vec<_> = sigs.iter().collect();
        let agg = BlsAggregateSignature::aggregate(&sig_refs).unwrap();

        let pubkeys: Vec<_> = keypairs.iter().map(|kp| &kp.public_key).collect();
        assert!(!agg.verify_same_message(b"wrong message", DST_ATTESTATION, &pubkeys));
    }

    #[test]
    fn test_aggregate_over_different_messages_fails() {
        let keypairs = keypairs(3);
        let sigs = [
            keypairs[0].sign_attestation(b"message a"),
            keypairs[1].sign_attestation(b"message a"),
            keypairs[2].sign_attestation(b"message b"),
        ];
        let agg = BlsAggregateSignature::aggregate(&sigs.iter().collect::<Vec<_>>()).unwrap();
        let pubkeys: Vec<_> = keypairs.iter().map(|kp| &kp.public_key).collect();

        assert!(!agg.verify_same_message(b"message a", DST_ATTESTATION, &pubkeys));
        assert!(!agg.verify_same_message(b"message b", DST_ATTESTATION, &pubkeys));
    }

    #[test]
    fn test_aggregate_against_subset_of_keys_fails() {
        let keypairs = keypairs(3);
        let msg = b"subset";
        let sigs: Vec<_> = keypairs.iter().map(|kp| kp.sign_attestation(msg)).collect();
        let agg = BlsAggregateSignature::aggregate(&sigs.iter().collect::<Vec<_>>()).unwrap();

        let subset = [&keypairs[0].public_key, &keypairs[1].public_key];
        assert!(!agg.verify_same_message(msg, DST_ATTESTATION, &subset));
    }

    #[test]
    fn test_empty_aggregation_fails() {
        assert!(matches!(
            BlsAggregateSignature::aggregate(&[]),
            Err(BlsError::EmptyAggregation)
        ));
        assert!(matches!(
            BlsPublicKey::aggregate(&[]),
            Err(BlsError::EmptyAggregation)
        ));
    }

    #[test]
    fn test_identity_public_key_rejected() {
        // Compressed point at infinity
        let mut infinity = [0u8; PUBLIC_KEY_LENGTH];
        infinity[0] = 0xc0;
        assert_eq!(
            BlsPublicKey::from_bytes(&infinity),
            Err(BlsError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_signature_bincode_roundtrip() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let sig = keypair.sign_attestation(b"test message");

        let encoded = bincode::serialize(&sig).unwrap();
        assert_eq!(encoded.len(), SIGNATURE_LENGTH);
        let decoded: BlsSignature = bincode::deserialize(&encoded).unwrap();
        assert_eq!(sig, decoded);
    }

    #[test]
    fn test_pubkey_json_is_hex() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let json = serde_json::to_string(&keypair.public_key).unwrap();
        assert_eq!(json, format!("\"{}\"", keypair.public_key.to_hex()));

        let decoded: BlsPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, keypair.public_key);
    }
}
