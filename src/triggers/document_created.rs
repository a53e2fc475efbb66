//! Reaction to newly created documents.
//!
//! Top-level documents in the watched collections are announced to users;
//! wishes posted to a birthday wall refresh the wall's timestamp. Anything
//! else is ignored. Failures never escape: they are logged and reported in
//! the returned outcome only.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::TriggerMetrics;
use crate::notification::{DataPayload, DeliveryOutcome, Notification, RoleFilter};
use crate::store::Fields;

use super::wall::{touch_birthday_wall, wall_owner};
use super::Services;

const TRIGGER: &str = "document_created";

/// Document title field
pub const TITLE_FIELD: &str = "title";

/// A "record created" event from the trigger runtime
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCreatedEvent {
    /// Collection path the document was created in
    pub path: String,
    pub document_id: String,
    /// Fields of the created document; absent when the snapshot was empty
    #[serde(default)]
    pub data: Option<Fields>,
}

impl DocumentCreatedEvent {
    pub fn new(path: impl Into<String>, document_id: impl Into<String>, data: Option<Fields>) -> Self {
        Self {
            path: path.into(),
            document_id: document_id.into(),
            data,
        }
    }
}

/// What the creation trigger did with an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreationOutcome {
    /// Not a collection this service reacts to
    Ignored,
    /// Watched collection, but the event carried no document data
    NoData,
    /// Notification dispatched (possibly to nobody)
    Notified(DeliveryOutcome),
    /// Targeted document whose audience field is not text; nobody notified
    UnreadableTarget,
    /// Birthday wall timestamp refreshed
    WallTouched,
    /// Resolution, dispatch or store write failed; details were logged
    Failed,
}

impl CreationOutcome {
    fn label(&self) -> &'static str {
        match self {
            CreationOutcome::Ignored => "ignored",
            CreationOutcome::NoData => "no_data",
            CreationOutcome::Notified(_) => "notified",
            CreationOutcome::UnreadableTarget => "unreadable_target",
            CreationOutcome::WallTouched => "wall_touched",
            CreationOutcome::Failed => "failed",
        }
    }
}

/// Route a creation event to the matching reaction.
#[tracing::instrument(
    name = "trigger.document_created",
    skip(services, event),
    fields(path = %event.path, document_id = %event.document_id)
)]
pub async fn on_document_created(
    services: &Services,
    event: &DocumentCreatedEvent,
) -> CreationOutcome {
    if let Some(user_id) = wall_owner(&event.path) {
        return if touch_birthday_wall(services, user_id, Utc::now()).await {
            CreationOutcome::WallTouched
        } else {
            CreationOutcome::Failed
        };
    }

    let outcome = notify_on_create(services, event).await;
    TriggerMetrics::record(TRIGGER, outcome.label());
    outcome
}

async fn notify_on_create(services: &Services, event: &DocumentCreatedEvent) -> CreationOutcome {
    let collection = event.path.as_str();
    let log_context = format!("sendNotificationOnCreate/{}/{}", collection, event.document_id);
    let settings = &services.notifications;

    if !settings.watched_collections.iter().any(|c| c == collection) {
        tracing::debug!(log_context = %log_context, "Collection not watched, ignoring");
        return CreationOutcome::Ignored;
    }

    tracing::info!(log_context = %log_context, "Document created");

    let Some(data) = event.data.as_ref() else {
        tracing::info!(log_context = %log_context, "Event carried no document data");
        return CreationOutcome::NoData;
    };

    let title = non_empty_str(data, TITLE_FIELD).unwrap_or(settings.default_title.as_str());
    let notification = Notification::new(title, settings.default_body.as_str());

    // Role targeting is limited to one collection
    let filter = if collection == settings.targeted_collection {
        match data.get(&settings.target_role_field) {
            None | Some(Value::Null) => RoleFilter::All,
            Some(Value::String(role)) => RoleFilter::from_option(Some(role.as_str())),
            Some(other) => {
                tracing::warn!(
                    log_context = %log_context,
                    field = %settings.target_role_field,
                    value = %other,
                    "Target role is not text, notifying nobody"
                );
                return CreationOutcome::UnreadableTarget;
            }
        }
    } else {
        RoleFilter::All
    };

    let mut payload = DataPayload::new();
    payload.insert("sourceCollection".to_string(), collection.to_string());
    payload.insert("sourceDocId".to_string(), event.document_id.clone());
    payload.insert("click_action".to_string(), settings.click_action.clone());

    let tokens = match services.resolver.resolve(&filter, &log_context).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(log_context = %log_context, error = %e, "Unhandled error");
            return CreationOutcome::Failed;
        }
    };

    match services
        .dispatcher
        .dispatch(&tokens, &notification, &payload, &log_context)
        .await
    {
        Ok(outcome) => CreationOutcome::Notified(outcome),
        Err(e) => {
            tracing::error!(log_context = %log_context, error = %e, "Unhandled error");
            CreationOutcome::Failed
        }
    }
}

fn non_empty_str<'a>(data: &'a Fields, field: &str) -> Option<&'a str> {
    match data.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}
