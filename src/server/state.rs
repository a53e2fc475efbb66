use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::postgres::PostgresPool;
use crate::triggers::Services;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub services: Arc<Services>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        services: Arc<Services>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            services,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
