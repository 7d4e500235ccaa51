//! Anytrust DAC Prometheus metrics infrastructure.
//!
//! This crate provides centralized metric definitions for both node roles.
//! Metrics are organized by role: member and aggregator.

pub mod aggregator;
pub mod member;
pub mod server;

pub use server::{gather_text, metrics_handler};

use once_cell::sync::Lazy;
use prometheus::Registry;

/// Global Prometheus registry for all anytrust metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();

    member::register_metrics(&registry);
    aggregator::register_metrics(&registry);

    registry
});

/// Initialize all metrics. Call once at startup.
pub fn init() {
    Lazy::force(&REGISTRY);
    tracing::info!("Anytrust metrics initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_registered_metrics() {
        init();
        member::MEMBER_SIGN_REQUESTS.with_label_values(&["ok"]).inc();
        aggregator::AGGREGATOR_SUBMIT_TOTAL
            .with_label_values(&["quorum_not_met"])
            .inc();

        let text = gather_text().unwrap();
        assert!(text.contains("anytrust_member_sign_requests_total"));
        assert!(text.contains("anytrust_aggregator_submit_total{result=\"quorum_not_met\"}"));
    }

    #[tokio::test]
    async fn test_metrics_handler_content_type() {
        init();
        let response = metrics_handler().await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            prometheus::TEXT_FORMAT
        );
    }
}
