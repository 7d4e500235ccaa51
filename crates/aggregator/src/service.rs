//! Aggregator service: committee fan-out and retrieval race
//!
//! Every request gets its own `JoinSet` with one task per member. Dropping
//! the set aborts whatever is still running, so no exit path leaks member
//! calls.

use crate::collector::{MemberResponse, SignatureCollector};
use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, MemberClientError, Result};
use crate::member_client::{HttpMemberClient, MemberClient};
use anytrust_crypto::BlsSignature;
use anytrust_metrics::aggregator::{
    AGGREGATOR_CERTIFICATE_SIGNERS, AGGREGATOR_FETCH_TOTAL, AGGREGATOR_MEMBER_FAILURES,
    AGGREGATOR_SUBMIT_LATENCY, AGGREGATOR_SUBMIT_TOTAL,
};
use anytrust_types::{AggregateCertificate, Committee, DataHash, SubmitBatchRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The committee aggregator
pub struct Aggregator {
    committee: Committee,
    clients: Vec<Arc<dyn MemberClient>>,
    member_timeout: Duration,
}

impl Aggregator {
    /// Create an aggregator over one client per committee member, in
    /// committee order
    pub fn new(config: AggregatorConfig, clients: Vec<Arc<dyn MemberClient>>) -> Result<Self> {
        if clients.len() != config.committee.size() {
            return Err(AggregatorError::Config(format!(
                "{} member clients for a committee of {}",
                clients.len(),
                config.committee.size()
            )));
        }

        Ok(Self {
            committee: config.committee,
            clients,
            member_timeout: config.member_timeout,
        })
    }

    /// Create an aggregator reaching every member over HTTP
    pub fn connect(config: AggregatorConfig) -> Result<Self> {
        let clients = config
            .committee
            .members()
            .iter()
            .map(|member| {
                HttpMemberClient::new(member.endpoint.clone(), config.member_timeout)
                    .map(|client| Arc::new(client) as Arc<dyn MemberClient>)
                    .map_err(|e| AggregatorError::Config(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(config, clients)
    }

    /// The committee this aggregator serves
    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// Fan `blob` out to every member and aggregate a quorum certificate.
    ///
    /// Waits for every member call to settle (or time out) before deciding.
    pub async fn submit(
        &self,
        blob: &[u8],
        submitter_signature: Option<&BlsSignature>,
    ) -> Result<AggregateCertificate> {
        let start = Instant::now();
        let result = self.submit_inner(blob, submitter_signature).await;
        AGGREGATOR_SUBMIT_LATENCY.observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(certificate) => {
                AGGREGATOR_SUBMIT_TOTAL.with_label_values(&["ok"]).inc();
                AGGREGATOR_CERTIFICATE_SIGNERS.observe(certificate.signer_count() as f64);
                info!(
                    data_hash = %certificate.data_hash,
                    signers = certificate.signer_count(),
                    committee = self.committee.size(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Issued certificate"
                );
            }
            Err(e) => {
                AGGREGATOR_SUBMIT_TOTAL
                    .with_label_values(&[e.error_code()])
                    .inc();
                warn!(error = %e, "Submission failed");
            }
        }

        result
    }

    async fn submit_inner(
        &self,
        blob: &[u8],
        submitter_signature: Option<&BlsSignature>,
    ) -> Result<AggregateCertificate> {
        if blob.is_empty() {
            return Err(AggregatorError::InvalidInput("empty blob".to_string()));
        }

        let data_hash = DataHash::compute(blob);
        let request = Arc::new(SubmitBatchRequest {
            data: blob.to_vec(),
            signature: submitter_signature.cloned(),
        });

        debug!(%data_hash, size = blob.len(), members = self.clients.len(), "Fanning out submission");

        let mut tasks = JoinSet::new();
        for (index, client) in self.clients.iter().enumerate() {
            let client = Arc::clone(client);
            let request = Arc::clone(&request);
            let timeout = self.member_timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, client.sign(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(MemberClientError::Timeout(timeout)),
                };
                (index, result)
            });
        }

        let mut responses: Vec<MemberResponse> = Vec::with_capacity(self.clients.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(response) => responses.push(response),
                Err(e) => error!(error = %e, "Member sign task failed"),
            }
        }

        SignatureCollector::new(&self.committee).collect(data_hash, responses)
    }

    /// Race every member for the blob with hash `data_hash`.
    ///
    /// Returned blobs are re-hashed; a mismatch is logged and the race goes
    /// on. The first verified blob wins and the remaining calls are aborted.
    pub async fn fetch(&self, data_hash: &DataHash) -> Result<Vec<u8>> {
        let mut tasks = JoinSet::new();
        for (index, client) in self.clients.iter().enumerate() {
            let client = Arc::clone(client);
            let data_hash = *data_hash;
            let timeout = self.member_timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, client.fetch(&data_hash)).await {
                    Ok(result) => result,
                    Err(_) => Err(MemberClientError::Timeout(timeout)),
                };
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, "Member fetch task failed");
                    continue;
                }
            };
            let endpoint = self.clients[index].endpoint();

            match result {
                Ok(blob) => {
                    let actual = DataHash::compute(&blob);
                    if actual == *data_hash {
                        tasks.abort_all();
                        AGGREGATOR_FETCH_TOTAL.with_label_values(&["ok"]).inc();
                        info!(%data_hash, member = index, endpoint, size = blob.len(), "Fetched blob");
                        return Ok(blob);
                    }
                    warn!(
                        %data_hash,
                        %actual,
                        member = index,
                        endpoint,
                        "Rejecting blob with wrong hash"
                    );
                    AGGREGATOR_MEMBER_FAILURES
                        .with_label_values(&[endpoint, "fetch", "hash_mismatch"])
                        .inc();
                }
                Err(MemberClientError::NotFound) => {
                    debug!(%data_hash, member = index, endpoint, "Member does not hold blob");
                    AGGREGATOR_MEMBER_FAILURES
                        .with_label_values(&[endpoint, "fetch", "not_found"])
                        .inc();
                }
                Err(e) => {
                    warn!(%data_hash, member = index, endpoint, error = %e, "Member fetch failed");
                    AGGREGATOR_MEMBER_FAILURES
                        .with_label_values(&[endpoint, "fetch", e.reason()])
                        .inc();
                }
            }
        }

        AGGREGATOR_FETCH_TOTAL
            .with_label_values(&["unavailable"])
            .inc();
        Err(AggregatorError::Unavailable(*data_hash))
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("committee_size", &self.committee.size())
            .field("quorum_threshold", &self.committee.quorum_threshold())
            .field("member_timeout", &self.member_timeout)
            .finish()
    }
}
