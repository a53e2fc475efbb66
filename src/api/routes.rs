use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};
use crate::triggers::{document_created, manual_notification, run_schedule};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Trigger runtime callbacks
        .nest(
            "/triggers",
            Router::new()
                .route("/documents", post(document_created))
                .route("/schedules/{job}", post(run_schedule))
                .route_layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
        // Client-facing endpoints
        .nest(
            "/api/v1",
            Router::new().route("/notifications/manual", post(manual_notification)),
        )
}
