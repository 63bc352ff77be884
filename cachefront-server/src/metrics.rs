//! Prometheus metrics for the content server

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Responses sent, by status and chosen encoding
pub static RESPONSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("cachefront_responses_total", "Total number of HTTP responses"),
        &["status", "encoding"],
    )
    .expect("metric can be created")
});

/// Time spent resolving a request against the cache
pub static RESOLVE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cachefront_resolve_duration_seconds",
            "Request resolution time in seconds",
        )
        .buckets(vec![
            0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
        ]),
        &["outcome"],
    )
    .expect("metric can be created")
});

/// Response bodies dropped before they were handed to the connection
pub static WRITE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cachefront_write_errors_total",
        "Responses whose body was not fully sent",
    )
    .expect("metric can be created")
});

/// Register metrics; safe to call more than once
pub fn init() {
    let _ = REGISTRY.register(Box::new(RESPONSES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RESOLVE_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(WRITE_ERRORS_TOTAL.clone()));
}

/// Gather metrics in Prometheus text format
pub fn gather() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
