//! Aggregator HTTP API
//!
//! - `POST /batch` certify a blob, returns the [`AggregateCertificate`]
//! - `GET /batch/:data_hash` retrieve a blob from any member
//! - `GET /health`
//! - `GET /metrics`

use crate::error::AggregatorError;
use crate::service::Aggregator;
use anytrust_types::{
    AggregateCertificate, BatchResponse, DataHash, ErrorResponse, HealthResponse,
    SubmitBatchRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

impl AggregatorError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AggregatorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AggregatorError::QuorumNotMet { .. } | AggregatorError::AllMembersUnreachable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AggregatorError::HashMismatch { .. } => StatusCode::BAD_GATEWAY,
            AggregatorError::InvalidAggregate { .. } | AggregatorError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AggregatorError::Unavailable(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Create the aggregator router
///
/// Blobs have no size limit, so axum's default body limit is disabled.
pub fn create_router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/batch", post(submit_batch))
        .route("/batch/:data_hash", get(get_batch))
        .route("/health", get(health))
        .route("/metrics", get(anytrust_metrics::metrics_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(aggregator)
}

async fn submit_batch(
    State(aggregator): State<Arc<Aggregator>>,
    payload: Result<Json<SubmitBatchRequest>, JsonRejection>,
) -> Result<Json<AggregateCertificate>, AggregatorError> {
    let Json(request) = payload.map_err(|e| AggregatorError::InvalidInput(e.body_text()))?;
    let certificate = aggregator
        .submit(&request.data, request.signature.as_ref())
        .await?;
    Ok(Json(certificate))
}

async fn get_batch(
    State(aggregator): State<Arc<Aggregator>>,
    Path(data_hash): Path<String>,
) -> Result<Json<BatchResponse>, AggregatorError> {
    let data_hash = DataHash::from_hex(&data_hash)
        .map_err(|e| AggregatorError::InvalidInput(e.to_string()))?;
    let data = aggregator.fetch(&data_hash).await?;
    Ok(Json(BatchResponse { data }))
}

async fn health(State(aggregator): State<Arc<Aggregator>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        public_key: None,
        committee_size: Some(aggregator.committee().size()),
    })
}
