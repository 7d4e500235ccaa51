//! Committee configuration, quorum arithmetic and the ordered key set.
//!
//! A committee of N members assumes at least F of them are honest. A
//! certificate needs Q = N - F + 1 attestations, so at least one of the
//! signers is guaranteed to be honest and to hold the data.

use anytrust_crypto::{BlsAggregateSignature, BlsError, BlsPublicKey, DST_ATTESTATION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Largest committee whose signers fit in a `u64` mask
pub const MAX_COMMITTEE_SIZE: usize = 64;

/// Mask value selecting every key of a key set
pub const ALL_MEMBERS_MASK: u64 = 0;

/// Committee configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitteeError {
    /// No members configured
    #[error("committee has no members")]
    Empty,

    /// More members than a signers mask can address
    #[error("committee has {size} members, maximum is {max}")]
    TooLarge {
        /// Configured size
        size: usize,
        /// Maximum size
        max: usize,
    },

    /// Assumed-honest count outside `1..=N`
    #[error("assumed honest count {assumed} must be between 1 and {size}")]
    InvalidAssumedHonest {
        /// Configured F
        assumed: usize,
        /// Committee size N
        size: usize,
    },

    /// The same endpoint appears twice
    #[error("duplicate member endpoint: {0}")]
    DuplicateEndpoint(String),

    /// The same public key appears twice
    #[error("duplicate public key at member index {0}")]
    DuplicatePublicKey(usize),

    /// A key set was requested but a member has no configured key
    #[error("member {0} has no configured public key")]
    MissingPublicKey(usize),

    /// Mask selects members outside the key set
    #[error("mask {mask:#x} selects members outside a key set of {size}")]
    InvalidMask {
        /// Offending mask
        mask: u64,
        /// Key set size
        size: usize,
    },

    /// Key aggregation failed
    #[error("key aggregation failed: {0}")]
    Crypto(#[from] BlsError),
}

/// One committee member as seen by the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    /// Base URL of the member's HTTP API
    pub endpoint: String,
    /// Expected member identity; responses advertising another key are rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<BlsPublicKey>,
}

impl CommitteeMember {
    /// Member with a known identity
    pub fn new(endpoint: impl Into<String>, public_key: BlsPublicKey) -> Self {
        Self {
            endpoint: endpoint.into(),
            public_key: Some(public_key),
        }
    }

    /// Member whose identity is taken from its responses
    pub fn unkeyed(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            public_key: None,
        }
    }
}

/// Committee configuration as loaded from disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeConfig {
    /// Members in committee order; indices address the signers bitmap
    pub members: Vec<CommitteeMember>,
    /// F: number of members assumed honest
    pub assumed_honest_count: usize,
}

impl CommitteeConfig {
    /// Create a configuration
    pub fn new(members: Vec<CommitteeMember>, assumed_honest_count: usize) -> Self {
        Self {
            members,
            assumed_honest_count,
        }
    }

    /// Check size, quorum bounds and uniqueness
    pub fn validate(&self) -> Result<(), CommitteeError> {
        let size = self.members.len();
        if size == 0 {
            return Err(CommitteeError::Empty);
        }
        if size > MAX_COMMITTEE_SIZE {
            return Err(CommitteeError::TooLarge {
                size,
                max: MAX_COMMITTEE_SIZE,
            });
        }
        if self.assumed_honest_count == 0 || self.assumed_honest_count > size {
            return Err(CommitteeError::InvalidAssumedHonest {
                assumed: self.assumed_honest_count,
                size,
            });
        }

        let mut endpoints = HashSet::with_capacity(size);
        let mut keys = HashSet::with_capacity(size);
        for (index, member) in self.members.iter().enumerate() {
            if !endpoints.insert(member.endpoint.as_str()) {
                return Err(CommitteeError::DuplicateEndpoint(member.endpoint.clone()));
            }
            if let Some(key) = &member.public_key {
                if !keys.insert(key.to_bytes()) {
                    return Err(CommitteeError::DuplicatePublicKey(index));
                }
            }
        }
        Ok(())
    }
}

/// Validated, immutable committee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committee {
    members: Vec<CommitteeMember>,
    assumed_honest_count: usize,
}

impl Committee {
    /// Validate a configuration into a committee
    pub fn new(config: CommitteeConfig) -> Result<Self, CommitteeError> {
        config.validate()?;
        Ok(Self {
            members: config.members,
            assumed_honest_count: config.assumed_honest_count,
        })
    }

    /// N
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// F
    pub fn assumed_honest_count(&self) -> usize {
        self.assumed_honest_count
    }

    /// Q = N - F + 1
    pub fn quorum_threshold(&self) -> usize {
        self.size() - self.assumed_honest_count + 1
    }

    /// Members in committee order
    pub fn members(&self) -> &[CommitteeMember] {
        &self.members
    }

    /// Member at `index`
    pub fn member(&self, index: usize) -> Option<&CommitteeMember> {
        self.members.get(index)
    }

    /// Ordered key set; requires every member to have a configured key
    pub fn key_set(&self) -> Result<KeySet, CommitteeError> {
        let keys = self
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| m.public_key.clone().ok_or(CommitteeError::MissingPublicKey(i)))
            .collect::<Result<Vec<_>, _>>()?;
        KeySet::new(keys)
    }

    /// Back to a serializable configuration
    pub fn to_config(&self) -> CommitteeConfig {
        CommitteeConfig::new(self.members.clone(), self.assumed_honest_count)
    }
}

/// Ordered committee public keys.
///
/// Bit `i` of a mask selects key `i`. A mask of [`ALL_MEMBERS_MASK`] selects
/// the whole set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet(Vec<BlsPublicKey>);

impl KeySet {
    /// Build a key set; keys must be unique and at most [`MAX_COMMITTEE_SIZE`]
    pub fn new(keys: Vec<BlsPublicKey>) -> Result<Self, CommitteeError> {
        if keys.is_empty() {
            return Err(CommitteeError::Empty);
        }
        if keys.len() > MAX_COMMITTEE_SIZE {
            return Err(CommitteeError::TooLarge {
                size: keys.len(),
                max: MAX_COMMITTEE_SIZE,
            });
        }
        let mut seen = HashSet::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if !seen.insert(key.to_bytes()) {
                return Err(CommitteeError::DuplicatePublicKey(i));
            }
        }
        Ok(Self(keys))
    }

    /// Parse hex-encoded compressed keys
    pub fn from_hex<S: AsRef<str>>(keys: &[S]) -> Result<Self, CommitteeError> {
        let keys = keys
            .iter()
            .map(|k| BlsPublicKey::from_hex(k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(keys)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key at `index`
    pub fn get(&self, index: usize) -> Option<&BlsPublicKey> {
        self.0.get(index)
    }

    /// Keys in order
    pub fn keys(&self) -> &[BlsPublicKey] {
        &self.0
    }

    /// Position of `key` in the set
    pub fn index_of(&self, key: &BlsPublicKey) -> Option<usize> {
        self.0.iter().position(|k| k == key)
    }

    /// Mask with bit `i` set iff key `i` is among `keys`
    pub fn compute_mask(&self, keys: &[&BlsPublicKey]) -> u64 {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, k)| keys.contains(k))
            .fold(0u64, |mask, (i, _)| mask | (1u64 << i))
    }

    /// Keys selected by `mask`
    pub fn select(&self, mask: u64) -> Result<Vec<&BlsPublicKey>, CommitteeError> {
        if mask == ALL_MEMBERS_MASK {
            return Ok(self.0.iter().collect());
        }
        if self.0.len() < MAX_COMMITTEE_SIZE && mask >> self.0.len() != 0 {
            return Err(CommitteeError::InvalidMask {
                mask,
                size: self.0.len(),
            });
        }
        Ok(self
            .0
            .iter()
            .enumerate()
            .filter(|(i, _)| (mask >> i) & 1 == 1)
            .map(|(_, k)| k)
            .collect())
    }

    /// Aggregate public key of the keys selected by `mask`
    pub fn aggregate(&self, mask: u64) -> Result<BlsPublicKey, CommitteeError> {
        let keys = self.select(mask)?;
        Ok(BlsPublicKey::aggregate(&keys)?)
    }

    /// Verify an aggregate attestation over `message` by the keys in `mask`
    pub fn verify(&self, message: &[u8], signature: &BlsAggregateSignature, mask: u64) -> bool {
        match self.select(mask) {
            Ok(keys) => signature.verify_same_message(message, DST_ATTESTATION, &keys),
            Err(_) => false,
        }
    }
}
