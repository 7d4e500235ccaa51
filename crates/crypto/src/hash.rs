//! Hashing utilities.

use sha3::{Digest, Keccak256};

/// Keccak-256 digest of a data blob.
///
/// This is the content identifier signed by committee members, so it must
/// stay a pure function of the input bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
