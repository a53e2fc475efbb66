//! Log-only push gateway.
//!
//! Stands in for FCM when no credentials are configured: every token is
//! reported as delivered and the message is written to the log instead.

use async_trait::async_trait;
use uuid::Uuid;

use super::backend::{BatchResponse, GatewayError, MulticastMessage, PushGateway, SendResponse};

#[derive(Debug, Default)]
pub struct LogGateway;

impl LogGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushGateway for LogGateway {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<BatchResponse, GatewayError> {
        tracing::info!(
            tokens = message.tokens.len(),
            title = %message.notification.title,
            body = %message.notification.body,
            data = ?message.data,
            "Push delivery (log gateway)"
        );

        let responses = message
            .tokens
            .iter()
            .map(|_| SendResponse::delivered(format!("log/{}", Uuid::new_v4())))
            .collect();

        Ok(BatchResponse::from_responses(responses))
    }
}
