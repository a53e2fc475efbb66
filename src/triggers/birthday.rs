use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::metrics::{StoreMetrics, TriggerMetrics};
use crate::notification::{DataPayload, Notification, RoleFilter};
use crate::store::{Document, FieldFilter};
use crate::users::{UserRecord, BIRTH_DAY_FIELD, BIRTH_MONTH_FIELD};

use super::Services;

const TRIGGER: &str = "birthdays";
const LOG_CONTEXT: &str = "sendBirthdayNotifications";

/// Summary of one birthday run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdaySummary {
    pub birthday_users: usize,
    pub targeted_tokens: usize,
    pub dispatches: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Set when the run stopped early on a store or gateway failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BirthdaySummary {
    fn outcome(&self) -> &'static str {
        if self.error.is_some() {
            "failed"
        } else if self.dispatches == 0 {
            "skipped"
        } else {
            "completed"
        }
    }
}

/// Announce today's birthdays to the whole community.
///
/// Every birthday person gets a separate broadcast to all tokens, sent one
/// after another. A failure stops the remaining broadcasts and is recorded
/// in the summary, never propagated.
#[tracing::instrument(name = "trigger.birthdays", skip(services), fields(date = %today))]
pub async fn send_birthday_notifications(services: &Services, today: NaiveDate) -> BirthdaySummary {
    let mut summary = BirthdaySummary::default();
    if let Err(e) = run(services, today, &mut summary).await {
        tracing::error!(log_context = LOG_CONTEXT, error = %e, "Birthday run failed");
        summary.error = Some(e);
    }
    TriggerMetrics::record(TRIGGER, summary.outcome());
    summary
}

async fn run(
    services: &Services,
    today: NaiveDate,
    summary: &mut BirthdaySummary,
) -> Result<(), String> {
    let (month, day) = (today.month(), today.day());
    tracing::info!(log_context = LOG_CONTEXT, day, month, "Checking birthdays");

    let filters = [
        FieldFilter::eq(BIRTH_MONTH_FIELD, month),
        FieldFilter::eq(BIRTH_DAY_FIELD, day),
    ];
    let celebrants: Vec<Document> = services
        .store
        .query(services.users_collection(), &filters)
        .await
        .map_err(|e| {
            StoreMetrics::record_error("query_birthdays");
            e.to_string()
        })?;

    summary.birthday_users = celebrants.len();
    if celebrants.is_empty() {
        tracing::info!(log_context = LOG_CONTEXT, "No birthdays today");
        return Ok(());
    }

    let tokens = services
        .resolver
        .resolve(&RoleFilter::All, LOG_CONTEXT)
        .await
        .map_err(|e| e.to_string())?;

    summary.targeted_tokens = tokens.len();
    if tokens.is_empty() {
        tracing::info!(log_context = LOG_CONTEXT, "No tokens to notify");
        return Ok(());
    }

    let settings = &services.notifications;
    for doc in &celebrants {
        let user = UserRecord::from_document(doc);
        let name = user
            .display_name
            .as_deref()
            .unwrap_or(settings.birthday_fallback_name.as_str());

        let notification = Notification::new(
            settings.birthday_title.as_str(),
            format!("Dziś urodziny świętuje {}! Złóż życzenia!", name),
        );

        let mut payload = DataPayload::new();
        payload.insert("type".to_string(), "BIRTHDAY".to_string());
        payload.insert("userId".to_string(), user.id.clone());
        payload.insert("click_action".to_string(), settings.click_action.clone());

        let outcome = services
            .dispatcher
            .dispatch(&tokens, &notification, &payload, LOG_CONTEXT)
            .await
            .map_err(|e| e.to_string())?;

        summary.dispatches += 1;
        summary.success_count += outcome.success_count;
        summary.failure_count += outcome.failure_count;
    }

    tracing::info!(
        log_context = LOG_CONTEXT,
        birthday_users = summary.birthday_users,
        dispatches = summary.dispatches,
        "Birthday notifications sent"
    );
    Ok(())
}
