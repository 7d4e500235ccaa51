//! Transport to committee members
//!
//! The aggregator only talks to members through [`MemberClient`]. Two
//! implementations are provided: [`HttpMemberClient`] for remote members and
//! [`LocalMemberClient`] for a member running in the same process.

use crate::error::MemberClientError;
use anytrust_member::{Member, MemberError};
use anytrust_storage::BlobStore;
use anytrust_types::{BatchResponse, DataHash, ErrorResponse, MemberSignature, SubmitBatchRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Operations the aggregator needs from one committee member
#[async_trait]
pub trait MemberClient: Send + Sync {
    /// Label identifying the member in logs and metrics
    fn endpoint(&self) -> &str;

    /// Ask the member to sign and store a blob
    async fn sign(&self, request: &SubmitBatchRequest) -> Result<MemberSignature, MemberClientError>;

    /// Ask the member for the blob stored under `data_hash`
    async fn fetch(&self, data_hash: &DataHash) -> Result<Vec<u8>, MemberClientError>;
}

/// Member reached over its HTTP API
pub struct HttpMemberClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpMemberClient {
    /// Create a client for the member at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MemberClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemberClientError::Unreachable(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> MemberClientError {
        if e.is_timeout() {
            MemberClientError::Timeout(self.timeout)
        } else if e.is_decode() {
            MemberClientError::InvalidResponse(e.to_string())
        } else {
            MemberClientError::Unreachable(e.to_string())
        }
    }

    async fn rejection(response: reqwest::Response) -> MemberClientError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return MemberClientError::NotFound;
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        MemberClientError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl MemberClient for HttpMemberClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn sign(&self, request: &SubmitBatchRequest) -> Result<MemberSignature, MemberClientError> {
        let url = format!("{}/batch", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            response.json().await.map_err(|e| self.transport_error(e))
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn fetch(&self, data_hash: &DataHash) -> Result<Vec<u8>, MemberClientError> {
        let url = format!("{}/batch/{}", self.base_url, data_hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            let body: BatchResponse = response.json().await.map_err(|e| self.transport_error(e))?;
            Ok(body.data)
        } else {
            Err(Self::rejection(response).await)
        }
    }
}

/// Member running in the same process
pub struct LocalMemberClient<S> {
    member: Arc<Member<S>>,
    label: String,
}

impl<S: BlobStore> LocalMemberClient<S> {
    /// Wrap an in-process member
    pub fn new(member: Arc<Member<S>>) -> Self {
        let label = format!("local:{}", &member.public_key().to_hex()[..16]);
        Self { member, label }
    }
}

fn local_error(e: MemberError) -> MemberClientError {
    match e {
        MemberError::NotFound(_) => MemberClientError::NotFound,
        other => MemberClientError::Rejected {
            status: other.status_code().as_u16(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl<S: BlobStore + 'static> MemberClient for LocalMemberClient<S> {
    fn endpoint(&self) -> &str {
        &self.label
    }

    async fn sign(&self, request: &SubmitBatchRequest) -> Result<MemberSignature, MemberClientError> {
        self.member
            .sign(&request.data, request.signature.as_ref())
            .await
            .map_err(local_error)
    }

    async fn fetch(&self, data_hash: &DataHash) -> Result<Vec<u8>, MemberClientError> {
        self.member.fetch(data_hash).await.map_err(local_error)
    }
}
