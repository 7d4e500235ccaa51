//! Member service: attest blobs and serve them back by hash
//!
//! `sign` hashes the blob, checks the submitter signature when one is
//! required, signs the hash and stores the record before answering. A
//! signature is only ever returned for a blob this member can serve.

use crate::config::MemberConfig;
use crate::error::{MemberError, Result};
use anytrust_crypto::{BlsKeyPair, BlsPublicKey, BlsSignature, DST_SUBMISSION};
use anytrust_metrics::member::{
    MEMBER_BLOB_SIZE_BYTES, MEMBER_FETCH_REQUESTS, MEMBER_SIGN_REQUESTS, MEMBER_STORE_LATENCY,
    MEMBER_STORE_RETRIES,
};
use anytrust_storage::{BlobStore, StorageError, StoredRecord};
use anytrust_types::{DataHash, MemberSignature};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A committee member
pub struct Member<S> {
    keypair: BlsKeyPair,
    submitter_public_key: Option<BlsPublicKey>,
    store_retry_attempts: u32,
    store_retry_backoff: std::time::Duration,
    store: S,
}

impl<S: BlobStore> Member<S> {
    /// Create a member over `store`
    pub fn new(config: MemberConfig, store: S) -> Self {
        Self {
            keypair: BlsKeyPair::from_secret_key(config.bls_secret_key),
            submitter_public_key: config.submitter_public_key,
            store_retry_attempts: config.store_retry_attempts.max(1),
            store_retry_backoff: config.store_retry_backoff,
            store,
        }
    }

    /// This member's identity
    pub fn public_key(&self) -> &BlsPublicKey {
        &self.keypair.public_key
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hash, sign and durably store `blob`.
    ///
    /// `submitter_signature` is required when a submitter key is configured
    /// and ignored otherwise.
    pub async fn sign(
        &self,
        blob: &[u8],
        submitter_signature: Option<&BlsSignature>,
    ) -> Result<MemberSignature> {
        let result = self.sign_inner(blob, submitter_signature).await;
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.error_code(),
        };
        MEMBER_SIGN_REQUESTS.with_label_values(&[label]).inc();
        result
    }

    async fn sign_inner(
        &self,
        blob: &[u8],
        submitter_signature: Option<&BlsSignature>,
    ) -> Result<MemberSignature> {
        if blob.is_empty() {
            return Err(MemberError::InvalidInput("empty blob".to_string()));
        }

        let data_hash = DataHash::compute(blob);

        if let Some(submitter) = &self.submitter_public_key {
            let signature = submitter_signature.ok_or_else(|| {
                warn!(%data_hash, "Rejecting submission without submitter signature");
                MemberError::Unauthorized("missing submitter signature".to_string())
            })?;
            if !signature.verify(data_hash.as_bytes(), DST_SUBMISSION, submitter) {
                warn!(%data_hash, "Rejecting submission with invalid submitter signature");
                return Err(MemberError::Unauthorized(
                    "invalid submitter signature".to_string(),
                ));
            }
        }

        let attestation = MemberSignature::sign(data_hash, &self.keypair);

        self.store_with_retry(StoredRecord {
            data_hash,
            blob: blob.to_vec(),
        })
        .await?;

        MEMBER_BLOB_SIZE_BYTES.observe(blob.len() as f64);
        info!(%data_hash, size = blob.len(), "Signed and stored blob");

        Ok(attestation)
    }

    async fn store_with_retry(&self, record: StoredRecord) -> Result<()> {
        let start = Instant::now();
        let data_hash = record.data_hash;
        let mut last_error: Option<StorageError> = None;

        for attempt in 1..=self.store_retry_attempts {
            if attempt > 1 {
                MEMBER_STORE_RETRIES.inc();
                tokio::time::sleep(self.store_retry_backoff * (attempt - 1)).await;
            }

            match self.store.put(record.clone()).await {
                Ok(()) => {
                    MEMBER_STORE_LATENCY.observe(start.elapsed().as_secs_f64());
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        %data_hash,
                        attempt,
                        max_attempts = self.store_retry_attempts,
                        error = %e,
                        "Failed to store record"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => MemberError::Storage(e),
            None => MemberError::Storage(StorageError::Config(
                "no store attempts configured".to_string(),
            )),
        })
    }

    /// Return the blob stored under `data_hash`
    pub async fn fetch(&self, data_hash: &DataHash) -> Result<Vec<u8>> {
        match self.store.get(data_hash).await {
            Ok(Some(record)) => {
                MEMBER_FETCH_REQUESTS.with_label_values(&["hit"]).inc();
                debug!(%data_hash, size = record.blob.len(), "Serving blob");
                Ok(record.blob)
            }
            Ok(None) => {
                MEMBER_FETCH_REQUESTS.with_label_values(&["miss"]).inc();
                Err(MemberError::NotFound(*data_hash))
            }
            Err(e) => {
                MEMBER_FETCH_REQUESTS.with_label_values(&["error"]).inc();
                warn!(%data_hash, error = %e, "Failed to read record");
                Err(e.into())
            }
        }
    }
}

impl<S> std::fmt::Debug for Member<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("public_key", &self.keypair.public_key)
            .field("submitter_public_key", &self.submitter_public_key)
            .finish_non_exhaustive()
    }
}
