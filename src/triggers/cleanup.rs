use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::metrics::{StoreMetrics, TriggerMetrics};
use crate::store::{format_timestamp, DocumentRef, DocumentStore, FieldFilter, StoreError};

use super::wall::{wishes_path, LAST_UPDATED_FIELD, WALLS_COLLECTION};
use super::Services;

const TRIGGER: &str = "cleanup";
const LOG_CONTEXT: &str = "cleanupOldWishes";

/// Summary of one cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub walls_found: usize,
    pub walls_deleted: usize,
    pub wishes_deleted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Delete every document of a collection, one page per atomic batch.
///
/// Pages are read in id order and deleted until a page comes back empty.
/// Returns the number of documents removed.
pub async fn delete_collection(
    store: &dyn DocumentStore,
    collection: &str,
    page_size: usize,
) -> Result<usize, StoreError> {
    let page_size = page_size.max(1);
    let mut removed = 0;

    loop {
        let page = store.list_page(collection, page_size).await?;
        if page.is_empty() {
            return Ok(removed);
        }

        let refs: Vec<DocumentRef> = page
            .into_iter()
            .map(|doc| DocumentRef::new(collection, doc.id))
            .collect();
        let deleted = store.delete_batch(&refs).await?;

        // A page the store refuses to delete would repeat forever
        if deleted == 0 {
            return Err(StoreError::Unavailable(format!(
                "no documents deleted from a non-empty page of {}",
                collection
            )));
        }
        removed += deleted;
    }
}

/// Remove birthday walls that saw no new wish within the retention window.
///
/// Walls are handled one after another: wishes first, then the wall itself.
/// The first failure stops the run and is recorded in the summary.
#[tracing::instrument(name = "trigger.cleanup", skip(services))]
pub async fn cleanup_old_wishes(services: &Services, now: DateTime<Utc>) -> CleanupSummary {
    let mut summary = CleanupSummary::default();
    if let Err(e) = run(services, now, &mut summary).await {
        StoreMetrics::record_error("cleanup");
        tracing::error!(log_context = LOG_CONTEXT, error = %e, "Cleanup failed");
        summary.error = Some(e.to_string());
    }

    let outcome = if summary.error.is_some() {
        "failed"
    } else if summary.walls_found == 0 {
        "skipped"
    } else {
        "completed"
    };
    TriggerMetrics::record(TRIGGER, outcome);
    summary
}

async fn run(
    services: &Services,
    now: DateTime<Utc>,
    summary: &mut CleanupSummary,
) -> Result<(), StoreError> {
    let settings = &services.scheduler;
    let cutoff = now - Duration::days(settings.wish_retention_days);
    tracing::info!(
        log_context = LOG_CONTEXT,
        cutoff = %format_timestamp(cutoff),
        "Starting cleanup of old wish walls"
    );

    let filters = [FieldFilter::lte(LAST_UPDATED_FIELD, format_timestamp(cutoff))];
    let walls = services.store.query(WALLS_COLLECTION, &filters).await?;

    summary.walls_found = walls.len();
    if walls.is_empty() {
        tracing::info!(log_context = LOG_CONTEXT, "No stale walls found");
        return Ok(());
    }
    tracing::info!(log_context = LOG_CONTEXT, walls = walls.len(), "Found stale walls");

    let store = services.store.as_ref();
    for wall in walls {
        let wishes = delete_collection(store, &wishes_path(&wall.id), settings.cleanup_page_size).await?;
        tracing::info!(
            log_context = LOG_CONTEXT,
            wall = %wall.id,
            wishes,
            "Deleted wishes"
        );
        summary.wishes_deleted += wishes;

        summary.walls_deleted += store
            .delete_batch(&[DocumentRef::new(WALLS_COLLECTION, wall.id)])
            .await?;
    }

    tracing::info!(
        log_context = LOG_CONTEXT,
        walls_deleted = summary.walls_deleted,
        wishes_deleted = summary.wishes_deleted,
        "Cleanup completed"
    );
    Ok(())
}
