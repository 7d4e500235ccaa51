//! Member HTTP API
//!
//! - `POST /batch` sign and store a blob
//! - `GET /batch/:data_hash` serve a stored blob
//! - `GET /health`
//! - `GET /metrics`

use crate::error::MemberError;
use crate::service::Member;
use anytrust_storage::BlobStore;
use anytrust_types::{
    BatchResponse, DataHash, ErrorResponse, HealthResponse, MemberSignature, SubmitBatchRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

impl MemberError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MemberError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MemberError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MemberError::NotFound(_) => StatusCode::NOT_FOUND,
            MemberError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MemberError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Create the member router
///
/// Blobs have no size limit, so axum's default body limit is disabled.
pub fn create_router<S: BlobStore + 'static>(member: Arc<Member<S>>) -> Router {
    Router::new()
        .route("/batch", post(sign_batch::<S>))
        .route("/batch/:data_hash", get(get_batch::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(anytrust_metrics::metrics_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(member)
}

async fn sign_batch<S: BlobStore>(
    State(member): State<Arc<Member<S>>>,
    payload: Result<Json<SubmitBatchRequest>, JsonRejection>,
) -> Result<Json<MemberSignature>, MemberError> {
    let Json(request) = payload.map_err(|e| MemberError::InvalidInput(e.body_text()))?;
    let attestation = member
        .sign(&request.data, request.signature.as_ref())
        .await?;
    Ok(Json(attestation))
}

async fn get_batch<S: BlobStore>(
    State(member): State<Arc<Member<S>>>,
    Path(data_hash): Path<String>,
) -> Result<Json<BatchResponse>, MemberError> {
    let data_hash = DataHash::from_hex(&data_hash)
        .map_err(|e| MemberError::InvalidInput(e.to_string()))?;
    let data = member.fetch(&data_hash).await?;
    Ok(Json(BatchResponse { data }))
}

async fn health<S: BlobStore>(State(member): State<Arc<Member<S>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        public_key: Some(member.public_key().clone()),
        committee_size: None,
    })
}
