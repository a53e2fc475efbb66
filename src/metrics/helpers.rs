//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DISPATCHES_TOTAL, DISPATCH_LATENCY, RESOLVED_TOKENS, STORE_ERRORS_TOTAL,
    TOKENS_DELIVERED_TOTAL, TOKENS_FAILED_TOTAL, TRIGGER_INVOCATIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct PushMetrics;

impl PushMetrics {
    /// Record a completed multicast
    pub fn record_sent(delivered: u64) {
        DISPATCHES_TOTAL.with_label_values(&["sent"]).inc();
        TOKENS_DELIVERED_TOTAL.inc_by(delivered);
    }

    /// Record one rejected token
    pub fn record_token_failure(code: &str) {
        TOKENS_FAILED_TOTAL.with_label_values(&[code]).inc();
    }

    /// Record a dispatch short-circuited by an empty audience
    pub fn record_skipped_empty() {
        DISPATCHES_TOTAL.with_label_values(&["skipped_empty"]).inc();
    }

    /// Record a dispatch aborted by a gateway-level error
    pub fn record_gateway_error() {
        DISPATCHES_TOTAL.with_label_values(&["gateway_error"]).inc();
    }

    /// Record multicast latency
    pub fn observe_latency(seconds: f64) {
        DISPATCH_LATENCY.observe(seconds);
    }

    /// Record the size of a resolved audience
    pub fn observe_resolved(tokens: usize) {
        RESOLVED_TOKENS.observe(tokens as f64);
    }
}

/// Helper struct for recording trigger metrics
pub struct TriggerMetrics;

impl TriggerMetrics {
    pub fn record(trigger: &str, outcome: &str) {
        TRIGGER_INVOCATIONS_TOTAL
            .with_label_values(&[trigger, outcome])
            .inc();
    }
}

/// Helper struct for recording store metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(operation: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }
}
