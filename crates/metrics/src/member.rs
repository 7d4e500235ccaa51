//! Member node metrics.

use once_cell::sync::Lazy;
use prometheus::{Counter, CounterVec, Histogram, Registry};

pub static MEMBER_SIGN_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        prometheus::opts!(
            "anytrust_member_sign_requests_total",
            "Sign requests handled, by result"
        ),
        &["result"],
    )
    .expect("metric can be created")
});

pub static MEMBER_FETCH_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        prometheus::opts!(
            "anytrust_member_fetch_requests_total",
            "Fetch requests handled, by result (hit, miss, error)"
        ),
        &["result"],
    )
    .expect("metric can be created")
});

pub static MEMBER_STORE_RETRIES: Lazy<Counter> = Lazy::new(|| {
    Counter::new(
        "anytrust_member_store_retries_total",
        "Record writes retried after a storage error",
    )
    .expect("metric can be created")
});

pub static MEMBER_STORE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(prometheus::histogram_opts!(
        "anytrust_member_store_latency_seconds",
        "Time to durably store a record, including retries",
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ))
    .expect("metric can be created")
});

pub static MEMBER_BLOB_SIZE_BYTES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(prometheus::histogram_opts!(
        "anytrust_member_blob_size_bytes",
        "Size of signed blobs in bytes",
        prometheus::exponential_buckets(256.0, 4.0, 10).expect("valid buckets")
    ))
    .expect("metric can be created")
});

pub fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(MEMBER_SIGN_REQUESTS.clone()))
        .ok();
    registry
        .register(Box::new(MEMBER_FETCH_REQUESTS.clone()))
        .ok();
    registry
        .register(Box::new(MEMBER_STORE_RETRIES.clone()))
        .ok();
    registry
        .register(Box::new(MEMBER_STORE_LATENCY.clone()))
        .ok();
    registry
        .register(Box::new(MEMBER_BLOB_SIZE_BYTES.clone()))
        .ok();
}
