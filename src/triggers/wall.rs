//! Birthday wish walls: `birthdayWishes/{userId}` with a `wishes` sub-collection.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::metrics::{StoreMetrics, TriggerMetrics};
use crate::store::{format_timestamp, Fields};

use super::Services;

pub const WALLS_COLLECTION: &str = "birthdayWishes";
pub const WISHES_SUBCOLLECTION: &str = "wishes";
pub const LAST_UPDATED_FIELD: &str = "lastUpdated";

const TRIGGER: &str = "wall_touch";

/// Collection path of a wall's wishes
pub fn wishes_path(user_id: &str) -> String {
    format!("{}/{}/{}", WALLS_COLLECTION, user_id, WISHES_SUBCOLLECTION)
}

/// Owner of the wall a wishes collection belongs to, if `collection` is one.
pub fn wall_owner(collection: &str) -> Option<&str> {
    let mut segments = collection.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(WALLS_COLLECTION), Some(user_id), Some(WISHES_SUBCOLLECTION), None)
            if !user_id.is_empty() =>
        {
            Some(user_id)
        }
        _ => None,
    }
}

/// Mark a wall as active after a new wish was posted to it.
///
/// Creates the wall document when it does not exist yet. Failures are
/// logged and reported as `false`, never propagated.
#[tracing::instrument(name = "trigger.wall_touch", skip(services, now))]
pub async fn touch_birthday_wall(services: &Services, user_id: &str, now: DateTime<Utc>) -> bool {
    let log_context = format!("updateBirthdayWallTimestamp/{}", user_id);
    tracing::info!(log_context = %log_context, "New wish posted, updating wall timestamp");

    let mut fields = Fields::new();
    fields.insert(
        LAST_UPDATED_FIELD.to_string(),
        Value::String(format_timestamp(now)),
    );

    match services.store.merge(WALLS_COLLECTION, user_id, fields).await {
        Ok(()) => {
            tracing::info!(log_context = %log_context, "Wall timestamp updated");
            TriggerMetrics::record(TRIGGER, "touched");
            true
        }
        Err(e) => {
            StoreMetrics::record_error("merge_wall");
            TriggerMetrics::record(TRIGGER, "failed");
            tracing::error!(
                log_context = %log_context,
                error = %e,
                "Failed to update wall timestamp"
            );
            false
        }
    }
}
