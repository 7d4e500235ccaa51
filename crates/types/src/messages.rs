//! JSON bodies shared by the member and aggregator HTTP APIs

use crate::DataHash;
use anytrust_crypto::{BlsKeyPair, BlsPublicKey, BlsSignature, DST_SUBMISSION};
use serde::{Deserialize, Serialize};

/// `POST /batch` request body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBatchRequest {
    /// Blob, hex-encoded
    #[serde(with = "hex_vec")]
    pub data: Vec<u8>,
    /// Submitter signature over the data hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<BlsSignature>,
}

impl SubmitBatchRequest {
    /// Unsigned submission
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            signature: None,
        }
    }

    /// Submission signed by the batch submitter
    pub fn signed(data: Vec<u8>, submitter: &BlsKeyPair) -> Self {
        let signature = submitter.sign_submission(DataHash::compute(&data).as_bytes());
        Self {
            data,
            signature: Some(signature),
        }
    }

    /// Check the submitter signature against `submitter_key` for `data_hash`
    pub fn verify_submitter(&self, data_hash: &DataHash, submitter_key: &BlsPublicKey) -> bool {
        self.signature
            .as_ref()
            .map(|sig| sig.verify(data_hash.as_bytes(), DST_SUBMISSION, submitter_key))
            .unwrap_or(false)
    }
}

/// `GET /batch/:data_hash` response body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Blob, hex-encoded
    #[serde(with = "hex_vec")]
    pub data: Vec<u8>,
}

/// Error body returned with every non-2xx status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable message
    pub error: String,
    /// Stable machine readable code
    pub code: String,
}

/// `GET /health` response body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy` when the process answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Member identity, for member nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<BlsPublicKey>,
    /// Committee size, for aggregators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committee_size: Option<usize>,
}

/// Hex (de)serialization for byte vectors, accepting an optional `0x` prefix
mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
