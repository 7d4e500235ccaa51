//! Aggregator metrics: fan-out, quorum outcomes and retrieval.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, Histogram, Registry};

pub static AGGREGATOR_SUBMIT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        prometheus::opts!(
            "anytrust_aggregator_submit_total",
            "Submissions handled, by result"
        ),
        &["result"],
    )
    .expect("metric can be created")
});

pub static AGGREGATOR_SUBMIT_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(prometheus::histogram_opts!(
        "anytrust_aggregator_submit_latency_seconds",
        "Time from submission to certificate or failure",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ))
    .expect("metric can be created")
});

pub static AGGREGATOR_CERTIFICATE_SIGNERS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(prometheus::histogram_opts!(
        "anytrust_aggregator_certificate_signers",
        "Number of members included in issued certificates",
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 16.0, 32.0, 64.0]
    ))
    .expect("metric can be created")
});

pub static AGGREGATOR_MEMBER_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        prometheus::opts!(
            "anytrust_aggregator_member_failures_total",
            "Per-member call failures, by operation and reason"
        ),
        &["member", "operation", "reason"],
    )
    .expect("metric can be created")
});

pub static AGGREGATOR_FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        prometheus::opts!(
            "anytrust_aggregator_fetch_total",
            "Retrievals handled, by result"
        ),
        &["result"],
    )
    .expect("metric can be created")
});

pub fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(AGGREGATOR_SUBMIT_TOTAL.clone()))
        .ok();
    registry
        .register(Box::new(AGGREGATOR_SUBMIT_LATENCY.clone()))
        .ok();
    registry
        .register(Box::new(AGGREGATOR_CERTIFICATE_SIGNERS.clone()))
        .ok();
    registry
        .register(Box::new(AGGREGATOR_MEMBER_FAILURES.clone()))
        .ok();
    registry
        .register(Box::new(AGGREGATOR_FETCH_TOTAL.clone()))
        .ok();
}
