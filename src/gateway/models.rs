//! FCM HTTP v1 wire types.

use serde::{Deserialize, Serialize};

use crate::notification::DataPayload;

/// Firebase Service Account Key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub auth_uri: String,
    pub token_uri: String,
}

/// OAuth2 Token Cache
#[derive(Debug, Clone)]
pub struct TokenCache {
    pub access_token: String,
    pub expires_at: i64,
}

/// JWT Claims for Google OAuth2
#[derive(Debug, Serialize)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Google OAuth2 Token Response
#[derive(Debug, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

/// FCM Message Request
#[derive(Debug, Serialize)]
pub struct FcmMessage<'a> {
    pub message: FcmMessageContent<'a>,
}

/// FCM Message Content
#[derive(Debug, Serialize)]
pub struct FcmMessageContent<'a> {
    pub token: &'a str,
    pub notification: FcmNotification<'a>,
    #[serde(skip_serializing_if = "is_empty_data")]
    pub data: &'a DataPayload,
}

fn is_empty_data(data: &&DataPayload) -> bool {
    data.is_empty()
}

/// FCM Notification Payload
#[derive(Debug, Serialize)]
pub struct FcmNotification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

/// FCM API Response (success)
#[derive(Debug, Deserialize)]
pub struct FcmApiResponse {
    pub name: Option<String>,
}

/// FCM API error envelope
#[derive(Debug, Deserialize)]
pub struct FcmErrorEnvelope {
    pub error: FcmErrorBody,
}

/// Google API error body
#[derive(Debug, Deserialize)]
pub struct FcmErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    /// Canonical status, e.g. `NOT_FOUND`, `INVALID_ARGUMENT`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

/// Typed error detail; FCM puts its own code in `errorCode`
#[derive(Debug, Deserialize)]
pub struct FcmErrorDetail {
    #[serde(rename = "@type", default)]
    pub type_url: Option<String>,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
}

impl FcmErrorBody {
    /// Most specific error code available: the FCM code, else the status.
    pub fn code(&self) -> Option<String> {
        self.details
            .iter()
            .find_map(|detail| detail.error_code.clone())
            .or_else(|| self.status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_prefers_fcm_detail() {
        let envelope: FcmErrorEnvelope = serde_json::from_str(
            r#"{
                "error": {
                    "code": 404,
                    "message": "Requested entity was not found.",
                    "status": "NOT_FOUND",
                    "details": [{
                        "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                        "errorCode": "UNREGISTERED"
                    }]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(envelope.error.code().as_deref(), Some("UNREGISTERED"));
        assert_eq!(
            envelope.error.message.as_deref(),
            Some("Requested entity was not found.")
        );
    }

    #[test]
    fn test_error_code_falls_back_to_status() {
        let envelope: FcmErrorEnvelope = serde_json::from_str(
            r#"{ "error": { "message": "bad", "status": "INVALID_ARGUMENT" } }"#,
        )
        .unwrap();

        assert_eq!(envelope.error.code().as_deref(), Some("INVALID_ARGUMENT"));
    }

    #[test]
    fn test_message_omits_empty_data() {
        let data = DataPayload::new();
        let message = FcmMessage {
            message: FcmMessageContent {
                token: "tok",
                notification: FcmNotification {
                    title: "t",
                    body: "b",
                },
                data: &data,
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["message"]["token"], "tok");
        assert!(json["message"].get("data").is_none());
    }
}
