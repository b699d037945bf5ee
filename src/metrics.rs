//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinecircle_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Backend Metrics
    pub static ref BACKEND_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinecircle_backend_requests_total", "Total number of social backend requests"),
        &["backend", "operation", "outcome"]
    ).expect("metric can be created");
    pub static ref BACKEND_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "cinecircle_backend_request_duration_seconds",
            "Social backend request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]),
        &["backend", "operation"]
    ).expect("metric can be created");

    // Social Store Metrics
    pub static ref SOCIAL_CACHE_HITS_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "cinecircle_social_cache_hits_total",
        "Follow data fetches served from the cached graph"
    ).expect("metric can be created");
    pub static ref SOCIAL_CACHE_MISSES_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "cinecircle_social_cache_misses_total",
        "Follow data fetches that went to the backend"
    ).expect("metric can be created");
    pub static ref SOCIAL_MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinecircle_social_mutations_total", "Social graph mutations by outcome"),
        &["operation", "outcome"]
    ).expect("metric can be created");
    pub static ref SOCIAL_GRAPH_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("cinecircle_social_graph_size", "Current number of entries in each social partition"),
        &["partition"]
    ).expect("metric can be created");

    // Recommendation Metrics
    pub static ref RECOMMENDATIONS_SENT_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "cinecircle_recommendations_sent_total",
        "Total number of recommendations delivered to recipients"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cinecircle_errors_total", "Total number of errors"),
        &["error_type", "source"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BACKEND_REQUESTS_TOTAL.clone()))
        .expect("BACKEND_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BACKEND_REQUEST_DURATION_SECONDS.clone()))
        .expect("BACKEND_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(SOCIAL_CACHE_HITS_TOTAL.clone()))
        .expect("SOCIAL_CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SOCIAL_CACHE_MISSES_TOTAL.clone()))
        .expect("SOCIAL_CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SOCIAL_MUTATIONS_TOTAL.clone()))
        .expect("SOCIAL_MUTATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SOCIAL_GRAPH_SIZE.clone()))
        .expect("SOCIAL_GRAPH_SIZE can be registered");
    REGISTRY
        .register(Box::new(RECOMMENDATIONS_SENT_TOTAL.clone()))
        .expect("RECOMMENDATIONS_SENT_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Time a backend call and record its outcome.
///
/// Used by every `SocialBackend` implementation so the two backends
/// report under the same metric names.
pub async fn observe_backend<T, E, F>(
    backend: &'static str,
    operation: &'static str,
    call: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let timer = BACKEND_REQUEST_DURATION_SECONDS
        .with_label_values(&[backend, operation])
        .start_timer();
    let result = call.await;
    timer.observe_duration();

    let outcome = if result.is_ok() { "ok" } else { "error" };
    BACKEND_REQUESTS_TOTAL
        .with_label_values(&[backend, operation, outcome])
        .inc();

    result
}
