use std::future::Future;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tokio::sync::Mutex;

use crate::config::FcmConfig;

use super::backend::{BatchResponse, GatewayError, MulticastMessage, PushGateway, SendResponse};
use super::models::*;

const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Refresh the access token when it has less than this many seconds left
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Code recorded for a token whose request never got a response
pub const NETWORK_ERROR_CODE: &str = "NETWORK_ERROR";

/// Result of one per-token HTTP attempt
enum Attempt {
    Answered(SendResponse),
    Unreachable(String),
}

/// Firebase Cloud Messaging gateway (HTTP v1 API).
///
/// FCM v1 has no multicast endpoint, so a multicast is sent as one request
/// per token with bounded concurrency. Response order follows token order.
pub struct FcmGateway {
    project_id: String,
    credentials: ServiceAccountKey,
    endpoint: String,
    max_concurrent_sends: usize,
    token_cache: Mutex<Option<TokenCache>>,
    http_client: reqwest::Client,
}

impl FcmGateway {
    /// Create a gateway from an already loaded service-account key.
    pub fn new(config: &FcmConfig, credentials: ServiceAccountKey) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        let project_id = if config.project_id.is_empty() {
            credentials.project_id.clone()
        } else {
            config.project_id.clone()
        };

        Ok(Self {
            project_id,
            credentials,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_concurrent_sends: config.max_concurrent_sends.max(1),
            token_cache: Mutex::new(None),
            http_client,
        })
    }

    /// Create a gateway, reading the service-account key from `credentials_path`.
    pub fn from_config(config: &FcmConfig) -> Result<Self, GatewayError> {
        let raw = std::fs::read_to_string(&config.credentials_path).map_err(|e| {
            GatewayError::Credentials(format!(
                "Cannot read {}: {}",
                config.credentials_path, e
            ))
        })?;
        let credentials: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| GatewayError::Credentials(format!("Malformed key file: {}", e)))?;

        Self::new(config, credentials)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }

    /// Get access token from service account (with caching)
    ///
    /// Concurrent callers that find the cache expired wait for a single refresh.
    pub async fn get_access_token(&self) -> Result<String, GatewayError> {
        self.access_token_with(|| self.fetch_access_token()).await
    }

    async fn access_token_with<F, Fut>(&self, fetch: F) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TokenCache, GatewayError>>,
    {
        let mut cache = self.token_cache.lock().await;
        if let Some(token) = usable_token(cache.as_ref(), Utc::now().timestamp()) {
            return Ok(token);
        }

        let fresh = fetch().await?;
        tracing::debug!(expires_at = fresh.expires_at, "FCM access token refreshed");
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    /// Exchange a signed service-account assertion for an access token.
    async fn fetch_access_token(&self) -> Result<TokenCache, GatewayError> {
        let now = Utc::now();
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: OAUTH_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| GatewayError::Credentials(format!("Failed to parse private key: {}", e)))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.credentials.private_key_id.clone());

        let assertion = encode(&header, &claims, &encoding_key)
            .map_err(|e| GatewayError::Credentials(format!("Failed to encode JWT: {}", e)))?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(format!(
                "Token request failed with status: {}",
                response.status()
            )));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Auth(format!("Failed to parse token response: {}", e)))?;

        Ok(TokenCache {
            access_token: token_response.access_token,
            expires_at: Utc::now().timestamp() + token_response.expires_in,
        })
    }

    async fn send_one(
        &self,
        url: &str,
        access_token: &str,
        token: &str,
        message: &MulticastMessage,
    ) -> Attempt {
        let body = FcmMessage {
            message: FcmMessageContent {
                token,
                notification: FcmNotification {
                    title: &message.notification.title,
                    body: &message.notification.body,
                },
                data: &message.data,
            },
        };

        let response = match self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Unreachable(e.to_string()),
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Attempt::Answered(SendResponse {
                success: true,
                message_id: message_id_from_body(&text),
                error: None,
            });
        }

        let failure = match serde_json::from_str::<FcmErrorEnvelope>(&text) {
            Ok(envelope) => SendResponse::failed(envelope.error.code(), envelope.error.message),
            Err(_) => SendResponse::failed(
                Some(format!("HTTP_{}", status.as_u16())),
                (!text.is_empty()).then_some(text),
            ),
        };
        Attempt::Answered(failure)
    }
}

/// Cached token still valid past the refresh margin
fn usable_token(cache: Option<&TokenCache>, now: i64) -> Option<String> {
    cache
        .filter(|cached| cached.expires_at > now + TOKEN_REFRESH_MARGIN_SECS)
        .map(|cached| cached.access_token.clone())
}

/// Message name from an accepted send; FCM owns the id, so none is invented.
fn message_id_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<FcmApiResponse>(body)
        .ok()
        .and_then(|response| response.name)
}

#[async_trait]
impl PushGateway for FcmGateway {
    fn name(&self) -> &'static str {
        "fcm"
    }

    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<BatchResponse, GatewayError> {
        if message.tokens.is_empty() {
            return Ok(BatchResponse::default());
        }

        let access_token = self.get_access_token().await?;
        let url = self.send_url();

        let sends: Vec<_> = message
            .tokens
            .iter()
            .map(|token| self.send_one(&url, &access_token, token, message))
            .collect();
        let attempts: Vec<Attempt> = stream::iter(sends)
            .buffered(self.max_concurrent_sends)
            .collect()
            .await;

        // Nothing answered at all: the gateway itself is unreachable
        if attempts.iter().all(|a| matches!(a, Attempt::Unreachable(_))) {
            let reason = attempts
                .into_iter()
                .find_map(|a| match a {
                    Attempt::Unreachable(reason) => Some(reason),
                    Attempt::Answered(_) => None,
                })
                .unwrap_or_default();
            return Err(GatewayError::Transport(reason));
        }

        let responses = attempts
            .into_iter()
            .map(|attempt| match attempt {
                Attempt::Answered(response) => response,
                Attempt::Unreachable(reason) => {
                    SendResponse::failed(Some(NETWORK_ERROR_CODE.to_string()), Some(reason))
                }
            })
            .collect();

        Ok(BatchResponse::from_responses(responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{DataPayload, Notification};

    fn test_credentials() -> ServiceAccountKey {
        ServiceAccountKey {
            project_id: "test-project".to_string(),
            private_key_id: "key-id".to_string(),
            private_key: "private-key".to_string(),
            client_email: "test@test.iam.gserviceaccount.com".to_string(),
            client_id: "123456".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "http://127.0.0.1:1/token".to_string(),
        }
    }

    fn test_config(endpoint: &str) -> FcmConfig {
        FcmConfig {
            enabled: true,
            endpoint: endpoint.to_string(),
            request_timeout_seconds: 2,
            ..FcmConfig::default()
        }
    }

    async fn seed_token(gateway: &FcmGateway, access_token: &str, ttl_secs: i64) {
        *gateway.token_cache.lock().await = Some(TokenCache {
            access_token: access_token.to_string(),
            expires_at: Utc::now().timestamp() + ttl_secs,
        });
    }

    #[test]
    fn test_project_id_falls_back_to_credentials() {
        let gateway = FcmGateway::new(&test_config("https://fcm.googleapis.com/"), test_credentials())
            .unwrap();
        assert_eq!(gateway.project_id(), "test-project");
        assert_eq!(
            gateway.send_url(),
            "https://fcm.googleapis.com/v1/projects/test-project/messages:send"
        );
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let gateway = FcmGateway::new(&test_config("http://127.0.0.1:1"), test_credentials())
            .unwrap();
        seed_token(&gateway, "cached-token", 3600).await;

        let token = gateway.get_access_token().await.unwrap();
        assert_eq!(token, "cached-token");
    }

    #[tokio::test]
    async fn test_expiring_token_is_not_reused() {
        let gateway = FcmGateway::new(&test_config("http://127.0.0.1:1"), test_credentials())
            .unwrap();
        seed_token(&gateway, "stale", 10).await;

        let cache = gateway.token_cache.lock().await.clone();
        assert!(usable_token(cache.as_ref(), Utc::now().timestamp()).is_none());
        // The test key is not a valid RSA key, so a refresh cannot succeed
        assert!(matches!(
            gateway.get_access_token().await,
            Err(GatewayError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_gateway_error() {
        let gateway = FcmGateway::new(&test_config("http://127.0.0.1:1"), test_credentials())
            .unwrap();
        seed_token(&gateway, "cached-token", 3600).await;

        let message = MulticastMessage {
            tokens: vec!["a".to_string(), "b".to_string()],
            notification: Notification::new("t", "b"),
            data: DataPayload::new(),
        };

        let result = gateway.send_multicast(&message).await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn test_empty_multicast_makes_no_request() {
        let gateway = FcmGateway::new(&test_config("http://127.0.0.1:1"), test_credentials())
            .unwrap();

        let message = MulticastMessage {
            tokens: vec![],
            notification: Notification::new("t", "b"),
            data: DataPayload::new(),
        };

        let response = gateway.send_multicast(&message).await.unwrap();
        assert_eq!(response, BatchResponse::default());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let gateway = FcmGateway::new(&test_config("http://127.0.0.1:1"), test_credentials())
            .unwrap();
        let counter = AtomicUsize::new(0);
        let fetches = &counter;
        let fetch = || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            Ok(TokenCache {
                access_token: "fresh".to_string(),
                expires_at: Utc::now().timestamp() + 3600,
            })
        };

        let (a, b, c) = tokio::join!(
            gateway.access_token_with(fetch),
            gateway.access_token_with(fetch),
            gateway.access_token_with(fetch),
        );

        assert_eq!(a.unwrap(), "fresh");
        assert_eq!(b.unwrap(), "fresh");
        assert_eq!(c.unwrap(), "fresh");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_message_id_is_taken_from_body_only() {
        assert_eq!(
            message_id_from_body(r#"{"name":"projects/p/messages/42"}"#).as_deref(),
            Some("projects/p/messages/42")
        );
        assert_eq!(message_id_from_body("{}"), None);
        assert_eq!(message_id_from_body("not json"), None);
    }

    #[test]
    fn test_missing_credentials_file() {
        let config = FcmConfig {
            credentials_path: "/nonexistent/service-account.json".to_string(),
            ..FcmConfig::default()
        };
        assert!(matches!(
            FcmGateway::from_config(&config),
            Err(GatewayError::Credentials(_))
        ));
    }
}
