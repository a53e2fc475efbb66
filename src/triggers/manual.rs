//! Administrator-initiated broadcast.
//!
//! The only foreground handler: every failure is returned to the caller as
//! a typed [`CallableError`]. Checks run in a fixed order and each rejects
//! before the next step touches the store or the gateway.

use serde::Serialize;
use serde_json::Value;

use crate::auth::CallerIdentity;
use crate::error::CallableError;
use crate::metrics::{StoreMetrics, TriggerMetrics};
use crate::notification::{DataPayload, Notification, RoleFilter};
use crate::users::UserRecord;

use super::Services;

const TRIGGER: &str = "manual";
const LOG_CONTEXT: &str = "sendManualNotification";

pub(super) const MSG_UNAUTHENTICATED: &str = "Musisz być zalogowany.";
const MSG_NOT_ADMIN: &str = "Brak uprawnień administratora.";
const MSG_INTERNAL: &str = "Wewnętrzny błąd serwera.";

/// Result returned to the administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualNotificationResponse {
    pub success: bool,
    pub message: String,
    pub details: ManualNotificationDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualNotificationDetails {
    pub success_count: usize,
    pub failure_count: usize,
    pub targeted_tokens_count: usize,
    /// Role the broadcast was limited to, `"all"` when unrestricted
    pub requested_role: String,
}

/// Validated request input
#[derive(Debug, Clone, PartialEq, Eq)]
struct ManualRequest {
    notification: Notification,
    filter: RoleFilter,
}

impl ManualRequest {
    /// Read `{title, body, targetRole}` from an untyped request payload.
    fn parse(data: &Value) -> Result<Self, CallableError> {
        let title = required_text(data, "title")?;
        let body = required_text(data, "body")?;

        let role = match data.get("targetRole") {
            None | Some(Value::Null) => None,
            Some(Value::String(role)) => Some(role.as_str()),
            Some(_) => {
                return Err(CallableError::InvalidArgument(
                    "Pole \"targetRole\" musi być tekstem.".to_string(),
                ))
            }
        };

        Ok(Self {
            notification: Notification::new(title, body),
            filter: RoleFilter::from_option(role),
        })
    }
}

fn required_text(data: &Value, field: &str) -> Result<String, CallableError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CallableError::InvalidArgument(format!("Pole \"{}\" jest wymagane.", field)))
}

/// Broadcast a notification written by an administrator.
///
/// `caller` is `None` when the request carried no valid credentials.
#[tracing::instrument(
    name = "trigger.manual",
    skip(services, caller, data),
    fields(caller = caller.map(|c| c.uid.as_str()).unwrap_or("-"))
)]
pub async fn send_manual_notification(
    services: &Services,
    caller: Option<&CallerIdentity>,
    data: &Value,
) -> Result<ManualNotificationResponse, CallableError> {
    let result = run(services, caller, data).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.status(),
    };
    TriggerMetrics::record(TRIGGER, outcome);
    result
}

async fn run(
    services: &Services,
    caller: Option<&CallerIdentity>,
    data: &Value,
) -> Result<ManualNotificationResponse, CallableError> {
    let Some(caller) = caller else {
        return Err(CallableError::Unauthenticated(MSG_UNAUTHENTICATED.to_string()));
    };

    ensure_admin(services, caller).await?;

    let request = ManualRequest::parse(data)?;

    let mut payload = DataPayload::new();
    payload.insert("triggeredBy".to_string(), "manual_admin".to_string());
    payload.insert("adminUid".to_string(), caller.uid.clone());
    payload.insert(
        "click_action".to_string(),
        services.notifications.click_action.clone(),
    );

    let tokens = services
        .resolver
        .resolve(&request.filter, LOG_CONTEXT)
        .await
        .map_err(|e| internal(caller, &e))?;

    let outcome = services
        .dispatcher
        .dispatch(&tokens, &request.notification, &payload, LOG_CONTEXT)
        .await
        .map_err(|e| internal(caller, &e))?;

    tracing::info!(
        log_context = LOG_CONTEXT,
        admin_uid = %caller.uid,
        role = %request.filter.label(),
        targeted = tokens.len(),
        success_count = outcome.success_count,
        failure_count = outcome.failure_count,
        "Manual notification processed"
    );

    Ok(ManualNotificationResponse {
        success: true,
        message: format!(
            "Powiadomienie przetworzone. Sukcesy={}, Błędy={}.",
            outcome.success_count, outcome.failure_count
        ),
        details: ManualNotificationDetails {
            success_count: outcome.success_count,
            failure_count: outcome.failure_count,
            targeted_tokens_count: tokens.len(),
            requested_role: request.filter.label().to_string(),
        },
    })
}

/// Reject callers whose user record lacks the administrator role.
async fn ensure_admin(services: &Services, caller: &CallerIdentity) -> Result<(), CallableError> {
    let record = services
        .store
        .get(services.users_collection(), &caller.uid)
        .await
        .map_err(|e| {
            StoreMetrics::record_error("get_caller");
            internal(caller, &e)
        })?;

    let is_admin = record
        .as_ref()
        .map(UserRecord::from_document)
        .is_some_and(|user| user.has_role(&services.notifications.admin_role));

    if !is_admin {
        tracing::warn!(
            log_context = LOG_CONTEXT,
            uid = %caller.uid,
            record_found = record.is_some(),
            "Caller is not an administrator"
        );
        return Err(CallableError::PermissionDenied(MSG_NOT_ADMIN.to_string()));
    }

    Ok(())
}

fn internal(caller: &CallerIdentity, error: &dyn std::error::Error) -> CallableError {
    tracing::error!(
        log_context = LOG_CONTEXT,
        admin_uid = %caller.uid,
        error = %error,
        "Manual notification failed"
    );
    CallableError::Internal(MSG_INTERNAL.to_string())
}
