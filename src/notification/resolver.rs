//! Recipient resolution: user collection → deduplicated token set.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::metrics::{PushMetrics, StoreMetrics};
use crate::store::{DocumentStore, StoreError};
use crate::users::UserRecord;

/// Label used in logs and responses when no role filter is active
pub const ALL_USERS_LABEL: &str = "all";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to load user records: {0}")]
    Store(#[from] StoreError),
}

/// Audience restriction of a resolution request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleFilter {
    /// Every user
    #[default]
    All,
    /// Users holding this role tag
    Role(String),
}

impl RoleFilter {
    /// Build a filter from an optional role, treating blank input as "all".
    pub fn from_option(role: Option<&str>) -> Self {
        match role.map(str::trim) {
            Some(role) if !role.is_empty() => Self::Role(role.to_string()),
            _ => Self::All,
        }
    }

    pub fn matches(&self, user: &UserRecord) -> bool {
        match self {
            Self::All => true,
            Self::Role(role) => user.has_role(role),
        }
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Role(role) => Some(role),
        }
    }

    pub fn label(&self) -> &str {
        self.role().unwrap_or(ALL_USERS_LABEL)
    }
}

/// Deduplicated delivery tokens in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    tokens: Vec<String>,
    seen: HashSet<String>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token; returns false if it was already present.
    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if self.seen.contains(&token) {
            return false;
        }
        self.seen.insert(token.clone());
        self.tokens.push(token);
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.seen.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.tokens
    }
}

impl<S: Into<String>> FromIterator<S> for TokenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

/// Collect the tokens of every user the filter admits.
pub fn collect_tokens<'a, I>(users: I, filter: &RoleFilter) -> TokenSet
where
    I: IntoIterator<Item = &'a UserRecord>,
{
    let mut tokens = TokenSet::new();
    for user in users {
        if !filter.matches(user) {
            continue;
        }
        for token in &user.tokens {
            tokens.insert(token.as_str());
        }
    }
    tokens
}

/// Resolves a role filter into the set of tokens to deliver to.
///
/// Always scans the whole users collection: roles are not stored in a shape
/// the store could index on, so filtering happens here.
pub struct RecipientResolver {
    store: Arc<dyn DocumentStore>,
    users_collection: String,
}

impl RecipientResolver {
    pub fn new(store: Arc<dyn DocumentStore>, users_collection: impl Into<String>) -> Self {
        Self {
            store,
            users_collection: users_collection.into(),
        }
    }

    pub fn users_collection(&self) -> &str {
        &self.users_collection
    }

    /// Resolve the unique tokens of all users matching `filter`.
    ///
    /// A store failure aborts the whole resolution; nothing partial is returned.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self, filter, log_context),
        fields(log_context = %log_context, role = %filter.label())
    )]
    pub async fn resolve(
        &self,
        filter: &RoleFilter,
        log_context: &str,
    ) -> Result<TokenSet, ResolveError> {
        tracing::debug!(role = %filter.label(), "Loading tokens");

        let documents = match self.store.list(&self.users_collection).await {
            Ok(documents) => documents,
            Err(e) => {
                StoreMetrics::record_error("list_users");
                tracing::error!(
                    log_context = %log_context,
                    error = %e,
                    "Failed to load user records"
                );
                return Err(e.into());
            }
        };

        let users: Vec<UserRecord> = documents.iter().map(UserRecord::from_document).collect();
        let tokens = collect_tokens(&users, filter);
        PushMetrics::observe_resolved(tokens.len());

        tracing::info!(
            log_context = %log_context,
            role = %filter.label(),
            users_scanned = users.len(),
            tokens = tokens.len(),
            "Resolved unique tokens"
        );

        Ok(tokens)
    }
}
