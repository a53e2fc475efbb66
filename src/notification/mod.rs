//! Notification types, recipient resolution, and fan-out dispatch.
//!
//! - `RecipientResolver`: scans the user directory into a deduplicated `TokenSet`
//! - `PushDispatcher`: delivers one notification to a `TokenSet` through a `PushGateway`

mod dispatcher;
mod resolver;
mod types;

pub use dispatcher::{DispatchError, DispatcherStats, DispatcherStatsSnapshot, PushDispatcher};
pub use resolver::{
    collect_tokens, RecipientResolver, ResolveError, RoleFilter, TokenSet, ALL_USERS_LABEL,
};
pub use types::{
    DataPayload, DeliveryOutcome, Notification, TokenResult, UNKNOWN_ERROR_CODE,
    UNKNOWN_ERROR_MESSAGE,
};
