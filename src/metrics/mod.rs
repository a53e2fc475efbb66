//! Prometheus metrics for the push service.
//!
//! - Dispatch metrics (multicasts sent, tokens delivered/failed, latency)
//! - Resolution metrics (audience size)
//! - Trigger metrics (invocations by trigger and outcome)
//! - Store metrics (failed operations)

mod helpers;

pub use helpers::{encode_metrics, PushMetrics, StoreMetrics, TriggerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "push";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatch attempts by result ("sent", "skipped_empty", "gateway_error")
    pub static ref DISPATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatches_total", METRIC_PREFIX),
        "Total fan-out dispatch attempts",
        &["result"]
    ).unwrap();

    /// Tokens the gateway accepted
    pub static ref TOKENS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tokens_delivered_total", METRIC_PREFIX),
        "Total tokens successfully delivered to"
    ).unwrap();

    /// Tokens the gateway rejected, by error code
    pub static ref TOKENS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tokens_failed_total", METRIC_PREFIX),
        "Total tokens whose delivery failed",
        &["code"]
    ).unwrap();

    /// Multicast round-trip latency in seconds
    pub static ref DISPATCH_LATENCY: Histogram = register_histogram!(
        format!("{}_dispatch_latency_seconds", METRIC_PREFIX),
        "Multicast dispatch latency in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // ============================================================================
    // Resolution Metrics
    // ============================================================================

    /// Unique tokens per resolution
    pub static ref RESOLVED_TOKENS: Histogram = register_histogram!(
        format!("{}_resolved_tokens", METRIC_PREFIX),
        "Distribution of unique tokens per resolution",
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    ).unwrap();

    // ============================================================================
    // Trigger Metrics
    // ============================================================================

    /// Trigger invocations by trigger name and outcome
    pub static ref TRIGGER_INVOCATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_trigger_invocations_total", METRIC_PREFIX),
        "Total trigger invocations",
        &["trigger", "outcome"]
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Failed store operations
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total failed document store operations",
        &["operation"]
    ).unwrap();
}
