//! User records as read from the users collection.
//!
//! Role data is stored inconsistently: some records carry `roles` as a plain
//! string, others as a list, and older ones a `role` string. Everything is
//! normalized into a [`RoleSet`] here so the rest of the service only ever
//! asks "does this user hold role X".

use std::collections::BTreeSet;

use serde_json::Value;

use crate::store::{Document, Fields};

/// Field holding the user's delivery tokens
pub const TOKENS_FIELD: &str = "fcmTokens";
/// Canonical role field (string or list)
pub const ROLES_FIELD: &str = "roles";
/// Legacy single-role field
pub const LEGACY_ROLE_FIELD: &str = "role";
pub const DISPLAY_NAME_FIELD: &str = "displayName";
pub const BIRTH_MONTH_FIELD: &str = "birthMonth";
pub const BIRTH_DAY_FIELD: &str = "birthDay";

/// Set of role tags held by a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Read roles from a record, accepting the string, list and legacy forms.
    pub fn from_fields(fields: &Fields) -> Self {
        let mut roles = BTreeSet::new();

        for field in [ROLES_FIELD, LEGACY_ROLE_FIELD] {
            match fields.get(field) {
                Some(Value::String(role)) => {
                    roles.insert(role.clone());
                }
                Some(Value::Array(items)) => {
                    roles.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
                _ => {}
            }
        }

        roles.retain(|role| !role.is_empty());
        Self(roles)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A user record reduced to the fields notifications care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    /// Eligible tokens in stored order; malformed entries already dropped
    pub tokens: Vec<String>,
    pub roles: RoleSet,
    pub display_name: Option<String>,
}

impl UserRecord {
    pub fn from_document(doc: &Document) -> Self {
        let tokens = match doc.fields.get(TOKENS_FIELD) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|token| is_valid_token(token))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        let display_name = doc
            .str_field(DISPLAY_NAME_FIELD)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Self {
            id: doc.id.clone(),
            tokens,
            roles: RoleSet::from_fields(&doc.fields),
            display_name,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Only non-empty strings are deliverable tokens.
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
}
