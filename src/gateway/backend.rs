//! Push gateway abstraction.
//!
//! The dispatcher depends on a single capability: a multicast send that
//! returns one response per token, in token order.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::notification::{DataPayload, Notification};

/// Gateway-level failures: no per-token breakdown was obtained.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid gateway credentials: {0}")]
    Credentials(String),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Gateway transport error: {0}")]
    Transport(String),
}

/// One multicast request
#[derive(Debug, Clone, Serialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub notification: Notification,
    pub data: DataPayload,
}

/// Error details of a failed delivery, as reported by the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendError {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Gateway response for one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<SendError>,
}

impl SendResponse {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(code: Option<String>, message: Option<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(SendError { code, message }),
        }
    }
}

/// Aggregate gateway response for one multicast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<SendResponse>,
}

impl BatchResponse {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Gateway identifier ("fcm", "log")
    fn name(&self) -> &'static str;

    /// Deliver one message to many tokens.
    ///
    /// Per-token failures are reported inside the `BatchResponse`; an `Err`
    /// means the request as a whole could not be made.
    async fn send_multicast(&self, message: &MulticastMessage)
        -> Result<BatchResponse, GatewayError>;
}
