//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub gateway: GatewayHealthResponse,
    pub dispatcher: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub url: String,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct GatewayHealthResponse {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub dispatcher: DispatcherStatsSnapshot,
    pub scheduler: SchedulerStats,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStats {
    pub enabled: bool,
    pub birthday_time: String,
    pub cleanup_time: String,
    pub wish_retention_days: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = &state.services;
    let uptime_seconds = state.start_time.elapsed().as_secs();

    // One-document read as a reachability probe
    let reachable = match services.store.list_page(services.users_collection(), 1).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health probe failed");
            false
        }
    };

    let postgres = state.postgres_pool.as_ref().map(|pool| {
        let inner_pool = pool.pool();
        PostgresHealthResponse {
            url: pool.database_url_masked(),
            pool_size: inner_pool.size(),
            idle_connections: inner_pool.num_idle() as u32,
        }
    });

    let status = if reachable { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        store: StoreHealthResponse {
            backend: services.store.backend_type().to_string(),
            reachable,
        },
        postgres,
        gateway: GatewayHealthResponse {
            name: services.dispatcher.gateway_name().to_string(),
        },
        dispatcher: services.dispatcher.stats(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let scheduler = &state.services.scheduler;

    Json(StatsResponse {
        dispatcher: state.services.dispatcher.stats(),
        scheduler: SchedulerStats {
            enabled: scheduler.enabled,
            birthday_time: scheduler.birthday_time.clone(),
            cleanup_time: scheduler.cleanup_time.clone(),
            wish_retention_days: scheduler.wish_retention_days,
        },
    })
}
