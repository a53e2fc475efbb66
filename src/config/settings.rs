use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fcm: FcmConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Shared secret for the trigger routes (`X-API-Key`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "memory" (default) or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Collection holding user records
    #[serde(default = "default_users_collection")]
    pub users_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// When disabled, deliveries go to the log-only gateway
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub project_id: String,
    /// Path to the service-account JSON key
    #[serde(default)]
    pub credentials_path: String,
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
    /// Upper bound on in-flight per-token sends within one multicast
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Role tag a caller needs for manual broadcasts
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
    #[serde(default = "default_click_action")]
    pub click_action: String,
    /// Collections whose new documents trigger a notification
    #[serde(default = "default_watched_collections")]
    pub watched_collections: Vec<String>,
    /// The only collection whose documents may narrow the audience by role
    #[serde(default = "default_targeted_collection")]
    pub targeted_collection: String,
    #[serde(default = "default_target_role_field")]
    pub target_role_field: String,
    #[serde(default = "default_title")]
    pub default_title: String,
    #[serde(default = "default_body")]
    pub default_body: String,
    #[serde(default = "default_birthday_title")]
    pub birthday_title: String,
    /// Name used when a birthday user has no display name
    #[serde(default = "default_birthday_fallback_name")]
    pub birthday_fallback_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// Local wall-clock time ("HH:MM") of the birthday broadcast
    #[serde(default = "default_birthday_time")]
    pub birthday_time: String,
    /// Local wall-clock time ("HH:MM") of the wish wall cleanup
    #[serde(default = "default_cleanup_time")]
    pub cleanup_time: String,
    #[serde(default = "default_wish_retention_days")]
    pub wish_retention_days: i64,
    #[serde(default = "default_cleanup_page_size")]
    pub cleanup_page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_users_collection() -> String {
    "users".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/push".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    600
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_max_concurrent_sends() -> usize {
    100
}

fn default_request_timeout() -> u64 {
    30
}

fn default_admin_role() -> String {
    "Admin".to_string()
}

fn default_click_action() -> String {
    "FLUTTER_NOTIFICATION_CLICK".to_string()
}

fn default_watched_collections() -> Vec<String> {
    vec![
        "ogloszenia".to_string(),
        "aktualnosci".to_string(),
        "events".to_string(),
    ]
}

fn default_targeted_collection() -> String {
    "ogloszenia".to_string()
}

fn default_target_role_field() -> String {
    "rolaDocelowa".to_string()
}

fn default_title() -> String {
    "Nowa informacja".to_string()
}

fn default_body() -> String {
    "Sprawdź szczegóły".to_string()
}

fn default_birthday_title() -> String {
    "🎉 Wszystkiego najlepszego! 🎉".to_string()
}

fn default_birthday_fallback_name() -> String {
    "Ktoś z naszej wspólnoty".to_string()
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_birthday_time() -> String {
    "09:00".to_string()
}

fn default_cleanup_time() -> String {
    "03:00".to_string()
}

fn default_wish_retention_days() -> i64 {
    7
}

fn default_cleanup_page_size() -> usize {
    100
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "community-push-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("store.backend", "memory")?
            .set_default("fcm.enabled", false)?
            .set_default("scheduler.enabled", true)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER_PORT, JWT_SECRET, STORE_BACKEND, FCM_PROJECT_ID, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            users_collection: default_users_collection(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: String::new(),
            credentials_path: String::new(),
            endpoint: default_fcm_endpoint(),
            max_concurrent_sends: default_max_concurrent_sends(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            admin_role: default_admin_role(),
            click_action: default_click_action(),
            watched_collections: default_watched_collections(),
            targeted_collection: default_targeted_collection(),
            target_role_field: default_target_role_field(),
            default_title: default_title(),
            default_body: default_body(),
            birthday_title: default_birthday_title(),
            birthday_fallback_name: default_birthday_fallback_name(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            birthday_time: default_birthday_time(),
            cleanup_time: default_cleanup_time(),
            wish_retention_days: default_wish_retention_days(),
            cleanup_page_size: default_cleanup_page_size(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);

        let store = StoreConfig::default();
        assert_eq!(store.backend, "memory");
        assert_eq!(store.users_collection, "users");
    }

    #[test]
    fn test_notification_defaults() {
        let notifications = NotificationsConfig::default();
        assert_eq!(notifications.admin_role, "Admin");
        assert_eq!(notifications.targeted_collection, "ogloszenia");
        assert_eq!(notifications.watched_collections.len(), 3);
        assert!(notifications
            .watched_collections
            .contains(&notifications.targeted_collection));
    }

    #[test]
    fn test_scheduler_defaults() {
        let scheduler = SchedulerConfig::default();
        assert!(scheduler.enabled);
        assert_eq!(scheduler.birthday_time, "09:00");
        assert_eq!(scheduler.cleanup_time, "03:00");
        assert_eq!(scheduler.wish_retention_days, 7);
        assert_eq!(scheduler.cleanup_page_size, 100);
    }

    #[test]
    fn test_fcm_disabled_by_default() {
        let fcm = FcmConfig::default();
        assert!(!fcm.enabled);
        assert_eq!(fcm.max_concurrent_sends, 100);
    }
}
