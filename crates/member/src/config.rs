//! Member service configuration

use anytrust_crypto::{BlsPublicKey, BlsSecretKey};
use std::time::Duration;

/// Member service configuration
#[derive(Clone)]
pub struct MemberConfig {
    /// BLS signing key for attestations
    pub bls_secret_key: BlsSecretKey,
    /// Batch submitter key; when set, every sign request must carry a valid
    /// submitter signature over the data hash
    pub submitter_public_key: Option<BlsPublicKey>,
    /// Attempts to durably store a record before failing (default: 3)
    pub store_retry_attempts: u32,
    /// Delay before the first retry, growing linearly per attempt (default: 50ms)
    pub store_retry_backoff: Duration,
}

impl MemberConfig {
    /// Create a new configuration with defaults
    pub fn new(bls_secret_key: BlsSecretKey) -> Self {
        Self {
            bls_secret_key,
            submitter_public_key: None,
            store_retry_attempts: 3,
            store_retry_backoff: Duration::from_millis(50),
        }
    }

    /// Require submissions signed by `key`
    pub fn with_submitter_public_key(mut self, key: BlsPublicKey) -> Self {
        self.submitter_public_key = Some(key);
        self
    }

    /// Set store retry parameters; at least one attempt is always made
    pub fn with_store_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.store_retry_attempts = attempts.max(1);
        self.store_retry_backoff = backoff;
        self
    }
}

impl std::fmt::Debug for MemberConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberConfig")
            .field("public_key", &self.bls_secret_key.public_key())
            .field("submitter_public_key", &self.submitter_public_key)
            .field("store_retry_attempts", &self.store_retry_attempts)
            .field("store_retry_backoff", &self.store_retry_backoff)
            .finish()
    }
}
