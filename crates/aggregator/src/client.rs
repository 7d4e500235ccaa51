//! Rollup-side client of the aggregator
//!
//! The client trusts its own committee key set, not the aggregator: every
//! certificate is re-checked against that key set and every retrieved blob is
//! re-hashed before it is handed back.

use crate::error::ClientError;
use anytrust_crypto::BlsKeyPair;
use anytrust_types::{
    AggregateCertificate, BatchRef, BatchResponse, Committee, DataHash, ErrorResponse,
    HealthResponse, KeySet, SubmitBatchRequest, ALL_MEMBERS_MASK,
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client posting batches to, and reading batches through, an aggregator
pub struct DacClient {
    client: Client,
    base_url: String,
    key_set: KeySet,
    submitter: Option<BlsKeyPair>,
    min_signers: usize,
}

impl DacClient {
    /// Create a client for the aggregator at `base_url`, trusting `key_set`.
    ///
    /// Accepts any certificate with at least one valid signer until
    /// [`with_min_signers`](Self::with_min_signers) says otherwise.
    pub fn new(
        base_url: impl Into<String>,
        key_set: KeySet,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_set,
            submitter: None,
            min_signers: 1,
        })
    }

    /// Create a client requiring the committee's quorum on every certificate
    pub fn for_committee(
        base_url: impl Into<String>,
        committee: &Committee,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let key_set = committee
            .key_set()
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        Ok(Self::new(base_url, key_set, timeout)?.with_min_signers(committee.quorum_threshold()))
    }

    /// Sign submissions with the batch submitter key
    pub fn with_submitter(mut self, submitter: BlsKeyPair) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Require at least `min_signers` signers per certificate
    pub fn with_min_signers(mut self, min_signers: usize) -> Self {
        self.min_signers = min_signers.max(1);
        self
    }

    /// The trusted committee key set
    pub fn key_set(&self) -> &KeySet {
        &self.key_set
    }

    /// Certify `data` and return its batch reference
    pub async fn post_batch(&self, data: &[u8]) -> Result<BatchRef, ClientError> {
        if data.is_empty() {
            return Err(ClientError::InvalidInput("empty blob".to_string()));
        }

        let data_hash = DataHash::compute(data);
        let request = match &self.submitter {
            Some(submitter) => SubmitBatchRequest::signed(data.to_vec(), submitter),
            None => SubmitBatchRequest::new(data.to_vec()),
        };

        let response = self
            .client
            .post(format!("{}/batch", self.base_url))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let certificate: AggregateCertificate = response.json().await?;

        if certificate.data_hash != data_hash {
            return Err(ClientError::HashMismatch {
                expected: data_hash,
                got: certificate.data_hash,
            });
        }
        if !certificate.verify_with_key_set(&self.key_set) {
            return Err(ClientError::InvalidCertificate(
                "aggregate signature does not verify against the committee key set".to_string(),
            ));
        }

        let batch_ref = certificate.to_batch_ref()?;
        self.verify_batch_ref(&batch_ref)?;

        info!(
            %data_hash,
            signers = certificate.signer_count(),
            "Batch certified"
        );
        Ok(batch_ref)
    }

    /// Check a batch reference against the trusted key set and signer minimum
    pub fn verify_batch_ref(&self, batch_ref: &BatchRef) -> Result<(), ClientError> {
        let signers = if batch_ref.signers_mask == ALL_MEMBERS_MASK {
            self.key_set.len()
        } else {
            batch_ref.signers_mask.count_ones() as usize
        };
        if signers < self.min_signers {
            return Err(ClientError::InsufficientSigners {
                got: signers,
                required: self.min_signers,
            });
        }
        if !batch_ref.verify(&self.key_set) {
            return Err(ClientError::InvalidCertificate(format!(
                "batch reference for {} does not verify",
                batch_ref.data_hash
            )));
        }
        Ok(())
    }

    /// Retrieve the blob certified by `batch_ref`
    pub async fn get_batch(&self, batch_ref: &BatchRef) -> Result<Vec<u8>, ClientError> {
        self.verify_batch_ref(batch_ref)?;
        self.get_batch_by_hash(&batch_ref.data_hash).await
    }

    /// Retrieve the blob with hash `data_hash`, checking the hash of what comes back
    pub async fn get_batch_by_hash(&self, data_hash: &DataHash) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(format!("{}/batch/{}", self.base_url, data_hash))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let body: BatchResponse = response.json().await?;

        let actual = DataHash::compute(&body.data);
        if actual != *data_hash {
            warn!(expected = %data_hash, got = %actual, "Aggregator returned wrong blob");
            return Err(ClientError::HashMismatch {
                expected: *data_hash,
                got: actual,
            });
        }

        debug!(%data_hash, size = body.data.len(), "Batch retrieved");
        Ok(body.data)
    }

    /// Aggregator health
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn api_error(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) => ClientError::Api {
                status,
                code: body.code,
                message: body.error,
            },
            Err(_) => ClientError::Api {
                status,
                code: "UNKNOWN".to_string(),
                message: text,
            },
        }
    }
}

impl std::fmt::Debug for DacClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DacClient")
            .field("base_url", &self.base_url)
            .field("committee_size", &self.key_set.len())
            .field("min_signers", &self.min_signers)
            .field("signs_submissions", &self.submitter.is_some())
            .finish()
    }
}
