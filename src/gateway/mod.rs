//! Push delivery gateways.
//!
//! - `FcmGateway`: Firebase Cloud Messaging HTTP v1
//! - `LogGateway`: logs deliveries, for development without credentials
//!
//! Use `create_push_gateway()` to pick one from configuration.

mod backend;
mod fcm;
mod log_backend;
mod models;

use std::sync::Arc;

use crate::config::FcmConfig;

pub use backend::{
    BatchResponse, GatewayError, MulticastMessage, PushGateway, SendError, SendResponse,
};
pub use fcm::{FcmGateway, NETWORK_ERROR_CODE};
pub use log_backend::LogGateway;
pub use models::ServiceAccountKey;

/// Create the push gateway selected by configuration.
///
/// A disabled FCM section yields the log gateway. An enabled one with
/// unreadable credentials is an error: silently logging instead of
/// delivering would hide a misconfiguration.
pub fn create_push_gateway(settings: &FcmConfig) -> Result<Arc<dyn PushGateway>, GatewayError> {
    if !settings.enabled {
        tracing::warn!(gateway = "log", "FCM disabled, deliveries will only be logged");
        return Ok(Arc::new(LogGateway::new()));
    }

    let gateway = FcmGateway::from_config(settings)?;
    tracing::info!(
        gateway = "fcm",
        project_id = %gateway.project_id(),
        max_concurrent_sends = settings.max_concurrent_sends,
        "Creating FCM push gateway"
    );
    Ok(Arc::new(gateway))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_fcm_uses_log_gateway() {
        let gateway = create_push_gateway(&FcmConfig::default()).unwrap();
        assert_eq!(gateway.name(), "log");
    }

    #[test]
    fn test_enabled_fcm_requires_credentials() {
        let config = FcmConfig {
            enabled: true,
            credentials_path: "/nonexistent/key.json".to_string(),
            ..FcmConfig::default()
        };
        assert!(create_push_gateway(&config).is_err());
    }
}
