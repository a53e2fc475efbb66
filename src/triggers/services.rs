use std::sync::Arc;

use crate::config::{NotificationsConfig, SchedulerConfig, Settings};
use crate::gateway::PushGateway;
use crate::notification::{PushDispatcher, RecipientResolver};
use crate::store::DocumentStore;

/// Process-wide collaborators shared by every trigger handler.
///
/// Built once at startup and never torn down; handlers receive it by
/// reference and keep no state of their own between invocations.
pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    pub resolver: RecipientResolver,
    pub dispatcher: PushDispatcher,
    pub notifications: NotificationsConfig,
    pub scheduler: SchedulerConfig,
}

impl Services {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        users_collection: impl Into<String>,
        notifications: NotificationsConfig,
        scheduler: SchedulerConfig,
    ) -> Self {
        Self {
            resolver: RecipientResolver::new(store.clone(), users_collection),
            dispatcher: PushDispatcher::new(gateway),
            store,
            notifications,
            scheduler,
        }
    }

    pub fn from_settings(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        settings: &Settings,
    ) -> Self {
        Self::new(
            store,
            gateway,
            settings.store.users_collection.clone(),
            settings.notifications.clone(),
            settings.scheduler.clone(),
        )
    }

    pub fn users_collection(&self) -> &str {
        self.resolver.users_collection()
    }
}
