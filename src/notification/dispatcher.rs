use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::gateway::{BatchResponse, GatewayError, MulticastMessage, PushGateway, SendResponse};
use crate::metrics::PushMetrics;

use super::resolver::TokenSet;
use super::types::{
    DataPayload, DeliveryOutcome, Notification, TokenResult, UNKNOWN_ERROR_CODE,
    UNKNOWN_ERROR_MESSAGE,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Push gateway failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Statistics for the push dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Multicasts handed to the gateway
    pub total_dispatches: AtomicU64,
    /// Dispatches skipped because nobody was targeted
    pub skipped_empty: AtomicU64,
    /// Dispatches aborted by a gateway error
    pub gateway_errors: AtomicU64,
    /// Tokens accepted by the gateway
    pub total_delivered: AtomicU64,
    /// Tokens rejected by the gateway
    pub total_failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_dispatches: self.total_dispatches.load(Ordering::Relaxed),
            skipped_empty: self.skipped_empty.load(Ordering::Relaxed),
            gateway_errors: self.gateway_errors.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_dispatches: u64,
    pub skipped_empty: u64,
    pub gateway_errors: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
}

/// Fans one notification out to a token set through the push gateway
pub struct PushDispatcher {
    gateway: Arc<dyn PushGateway>,
    stats: DispatcherStats,
}

impl PushDispatcher {
    pub fn new(gateway: Arc<dyn PushGateway>) -> Self {
        Self {
            gateway,
            stats: DispatcherStats::default(),
        }
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver `notification` and `data` to every token.
    ///
    /// An empty token set returns a zero outcome without touching the
    /// gateway. Per-token failures are reported in the outcome; only a
    /// gateway-level failure is an `Err`. Failed tokens are left as they are.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, tokens, notification, data, log_context),
        fields(log_context = %log_context, tokens = tokens.len())
    )]
    pub async fn dispatch(
        &self,
        tokens: &TokenSet,
        notification: &Notification,
        data: &DataPayload,
        log_context: &str,
    ) -> Result<DeliveryOutcome, DispatchError> {
        if tokens.is_empty() {
            tracing::info!(log_context = %log_context, "No tokens to send to");
            self.stats.skipped_empty.fetch_add(1, Ordering::Relaxed);
            PushMetrics::record_skipped_empty();
            return Ok(DeliveryOutcome::empty());
        }

        tracing::info!(
            log_context = %log_context,
            tokens = tokens.len(),
            gateway = self.gateway.name(),
            "Sending multicast"
        );

        let message = MulticastMessage {
            tokens: tokens.as_slice().to_vec(),
            notification: notification.clone(),
            data: data.clone(),
        };

        let started = Instant::now();
        let response = match self.gateway.send_multicast(&message).await {
            Ok(response) => response,
            Err(e) => {
                self.stats.gateway_errors.fetch_add(1, Ordering::Relaxed);
                PushMetrics::record_gateway_error();
                tracing::error!(
                    log_context = %log_context,
                    error = %e,
                    "Push gateway request failed"
                );
                return Err(e.into());
            }
        };
        PushMetrics::observe_latency(started.elapsed().as_secs_f64());

        let outcome = tabulate(tokens.as_slice(), response, log_context);

        self.stats.total_dispatches.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_delivered
            .fetch_add(outcome.success_count as u64, Ordering::Relaxed);
        self.stats
            .total_failed
            .fetch_add(outcome.failure_count as u64, Ordering::Relaxed);
        PushMetrics::record_sent(outcome.success_count as u64);

        tracing::info!(
            log_context = %log_context,
            success_count = outcome.success_count,
            failure_count = outcome.failure_count,
            "Multicast completed"
        );

        Ok(outcome)
    }
}

/// Align gateway responses with the dispatched tokens, one result each.
///
/// Missing positions count as failures; surplus responses are dropped.
fn tabulate(tokens: &[String], response: BatchResponse, log_context: &str) -> DeliveryOutcome {
    let reported = response.responses.len();
    if reported != tokens.len() {
        tracing::warn!(
            log_context = %log_context,
            tokens = tokens.len(),
            responses = reported,
            "Gateway response count does not match token count"
        );
    }

    let mut responses = response.responses.into_iter();
    let mut results = Vec::with_capacity(tokens.len());

    for (idx, token) in tokens.iter().enumerate() {
        let result = match responses.next() {
            Some(SendResponse {
                success: true,
                message_id,
                ..
            }) => TokenResult::delivered(token.as_str(), message_id),
            Some(SendResponse { error, .. }) => {
                let error = error.unwrap_or_default();
                failed_result(idx, token, error.code, error.message, log_context)
            }
            None => failed_result(idx, token, None, None, log_context),
        };
        results.push(result);
    }

    DeliveryOutcome::from_results(results)
}

fn failed_result(
    idx: usize,
    token: &str,
    code: Option<String>,
    message: Option<String>,
    log_context: &str,
) -> TokenResult {
    let code = code
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR_CODE.to_string());
    let message = message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());
    let shown_token = if token.is_empty() {
        format!("unknown_token_{}", idx)
    } else {
        token.to_string()
    };

    PushMetrics::record_token_failure(&code);
    tracing::warn!(
        log_context = %log_context,
        token = %shown_token,
        index = idx,
        code = %code,
        message = %message,
        "Token delivery failed"
    );

    TokenResult::failed(shown_token, Some(code), Some(message))
}
