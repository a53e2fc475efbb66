//! Trigger handlers.
//!
//! Each handler composes recipient resolution and fan-out dispatch for one
//! trigger shape. The background handlers (`on_document_created`,
//! `send_birthday_notifications`, `cleanup_old_wishes`) log failures and
//! return a summary; only `send_manual_notification` returns typed errors.

mod birthday;
mod cleanup;
mod document_created;
mod http;
mod manual;
mod services;
mod wall;

pub use birthday::{send_birthday_notifications, BirthdaySummary};
pub use cleanup::{cleanup_old_wishes, delete_collection, CleanupSummary};
pub use document_created::{on_document_created, CreationOutcome, DocumentCreatedEvent};
pub use http::{document_created, manual_notification, run_schedule};
pub use manual::{send_manual_notification, ManualNotificationDetails, ManualNotificationResponse};
pub use services::Services;
pub use wall::{
    touch_birthday_wall, wall_owner, wishes_path, LAST_UPDATED_FIELD, WALLS_COLLECTION,
    WISHES_SUBCOLLECTION,
};
