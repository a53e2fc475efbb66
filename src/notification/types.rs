use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Auxiliary key/value data attached to every delivery attempt.
pub type DataPayload = BTreeMap<String, String>;

/// Error code recorded when the gateway gives none
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_CODE";

/// Error message recorded when the gateway gives none
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Visible part of a push notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Outcome of delivering to one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub token: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TokenResult {
    pub fn delivered(token: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            success: true,
            message_id,
            error_code: None,
            error_message: None,
        }
    }

    pub fn failed(token: impl Into<String>, code: Option<String>, message: Option<String>) -> Self {
        Self {
            token: token.into(),
            success: false,
            message_id: None,
            error_code: code,
            error_message: message,
        }
    }
}

/// Aggregate result of one fan-out dispatch.
///
/// `responses` is positionally aligned with the dispatched token order and
/// always holds exactly one entry per token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<TokenResult>,
}

impl DeliveryOutcome {
    /// Outcome of a dispatch that had nobody to deliver to
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an outcome from per-token results, deriving the counts.
    pub fn from_results(responses: Vec<TokenResult>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// Results of the tokens that failed
    pub fn failures(&self) -> impl Iterator<Item = &TokenResult> {
        self.responses.iter().filter(|r| !r.success)
    }
}
