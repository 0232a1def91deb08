//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic; the embedding application decides
//! whether and how to expose `REGISTRY`.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Relationship Metrics
    pub static ref RELATIONSHIP_TOGGLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jaipp_relationship_toggles_total", "Total number of relationship toggles"),
        &["kind", "action", "outcome"]
    ).expect("metric can be created");
    pub static ref RELATIONSHIP_HYDRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jaipp_relationship_hydrations_total", "Total number of cache hydrations"),
        &["kind", "status"]
    ).expect("metric can be created");

    // Store Metrics
    pub static ref STORE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jaipp_store_requests_total", "Total number of remote store requests"),
        &["backend", "operation", "status"]
    ).expect("metric can be created");
    pub static ref STORE_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "jaipp_store_request_duration_seconds",
            "Remote store request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["backend", "operation"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("jaipp_cache_size", "Targets held across live relationship caches"),
        &["kind"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jaipp_errors_total", "Total number of errors"),
        &["error_type", "operation"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(RELATIONSHIP_TOGGLES_TOTAL.clone()))
        .expect("RELATIONSHIP_TOGGLES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(RELATIONSHIP_HYDRATIONS_TOTAL.clone()))
        .expect("RELATIONSHIP_HYDRATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORE_REQUESTS_TOTAL.clone()))
        .expect("STORE_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORE_REQUEST_DURATION_SECONDS.clone()))
        .expect("STORE_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(CACHE_SIZE.clone()))
        .expect("CACHE_SIZE can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record one remote store request.
pub fn observe_store_request(backend: &str, operation: &str, status: &str, elapsed: Duration) {
    STORE_REQUESTS_TOTAL
        .with_label_values(&[backend, operation, status])
        .inc();
    STORE_REQUEST_DURATION_SECONDS
        .with_label_values(&[backend, operation])
        .observe(elapsed.as_secs_f64());
}
