//! HTTP entry points of the trigger handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Local;
use serde_json::Value;

use crate::auth::CallerIdentity;
use crate::error::{AppError, CallableError, Result};
use crate::server::{extract_bearer_token, AppState};
use crate::tasks::{run_job, JobReport, ScheduledJob};

use super::manual::MSG_UNAUTHENTICATED;
use super::{
    on_document_created, send_manual_notification, CreationOutcome, DocumentCreatedEvent,
    ManualNotificationResponse,
};

/// POST /triggers/documents - a document was created
#[tracing::instrument(name = "http.document_created", skip_all)]
pub async fn document_created(
    State(state): State<AppState>,
    Json(event): Json<DocumentCreatedEvent>,
) -> Json<CreationOutcome> {
    Json(on_document_created(&state.services, &event).await)
}

/// POST /triggers/schedules/{job} - run a scheduled job now
#[tracing::instrument(name = "http.run_schedule", skip_all)]
pub async fn run_schedule(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<JobReport>> {
    let job = ScheduledJob::from_name(&job).map_err(|e| AppError::NotFound(e.to_string()))?;
    Ok(Json(run_job(&state.services, job, Local::now()).await))
}

/// POST /api/v1/notifications/manual - administrator broadcast
///
/// Credentials are optional at this layer: a missing token reaches the
/// handler as an anonymous caller and an invalid one is rejected here, both
/// as `unauthenticated`. The body is parsed only after that.
#[tracing::instrument(name = "http.manual_notification", skip_all)]
pub async fn manual_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<ManualNotificationResponse>, CallableError> {
    let caller: Option<CallerIdentity> = match extract_bearer_token(&headers) {
        Some(token) => match state.jwt_validator.identify(token) {
            Ok(caller) => Some(caller),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected bearer token");
                return Err(CallableError::Unauthenticated(MSG_UNAUTHENTICATED.to_string()));
            }
        },
        None => None,
    };

    let data = request_data(&body);
    send_manual_notification(&state.services, caller.as_ref(), &data)
        .await
        .map(Json)
}

/// Decode the request payload, unwrapping a callable-style `{"data": {..}}` envelope.
///
/// An unreadable body becomes `null`, which fails field validation.
fn request_data(body: &[u8]) -> Value {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match value {
        Value::Object(mut map) if map.len() == 1 && map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
