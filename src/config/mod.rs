mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, FcmConfig, JwtConfig, NotificationsConfig, OtelConfig,
    SchedulerConfig, ServerConfig, Settings, StoreConfig,
};
