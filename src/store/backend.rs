//! Backend trait for document storage.
//!
//! Handlers only ever need four capabilities from the store: a full
//! collection read, field-filtered queries, atomic batched deletes and
//! point reads by id. The trait keeps them independent of the storage
//! technology so the in-memory and PostgreSQL backends are interchangeable.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field map of a single document.
pub type Fields = serde_json::Map<String, Value>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A document read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, unique within its collection
    pub id: String,
    /// Document fields
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Read a string field, ignoring values of any other type.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Address of a document: its collection path and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Comparison operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `field == value`
    Eq,
    /// `field <= value`
    Lte,
}

/// A single `field <op> value` predicate. Filters in a query are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a document's fields.
    ///
    /// A missing field never matches. Numbers compare numerically, strings
    /// lexicographically; values of different types never satisfy `Lte`.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => compare_values(actual, &self.value) == Some(Ordering::Equal),
            FilterOp::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

/// Render a timestamp the way it is stored in document fields.
///
/// Fixed-width RFC 3339 in UTC, so string order equals time order and
/// `FilterOp::Lte` works on timestamps.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Document store abstraction.
///
/// Collections are addressed by slash-separated paths, so a sub-collection
/// such as `birthdayWishes/u1/wishes` is just another collection name.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend type identifier ("memory", "postgres")
    fn backend_type(&self) -> &'static str;

    /// Read every document in a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Read at most `limit` documents of a collection, ordered by id.
    async fn list_page(&self, collection: &str, limit: usize)
        -> Result<Vec<Document>, StoreError>;

    /// Read the documents matching all filters, ordered by id.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, StoreError>;

    /// Read a single document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Merge fields into a document, creating it when absent.
    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Delete all referenced documents in one atomic batch.
    ///
    /// Returns the number of documents that existed and were removed.
    async fn delete_batch(&self, refs: &[DocumentRef]) -> Result<usize, StoreError>;
}
