//! In-memory document store backend.
//!
//! Used for development, single-instance deployments and tests. Data is
//! lost on restart. A `delete_batch` is atomic per collection: readers see
//! a collection either before or after its part of the batch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{Document, DocumentRef, DocumentStore, FieldFilter, Fields, StoreError};

/// In-memory store keyed by collection path, with documents ordered by id.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, BTreeMap<String, Fields>>,
    /// When set, every operation fails with `StoreError::Unavailable`
    unavailable: AtomicBool,
    /// Number of read operations served (list, list_page, query, get)
    reads: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: all subsequent operations fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of read operations performed so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of documents currently held in a collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn begin_read(&self) -> Result<(), StoreError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn collect<F>(&self, collection: &str, limit: Option<usize>, mut keep: F) -> Vec<Document>
    where
        F: FnMut(&Fields) -> bool,
    {
        let Some(docs) = self.collections.get(collection) else {
            return Vec::new();
        };

        docs.iter()
            .filter(|(_, fields)| keep(fields))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.begin_read()?;
        Ok(self.collect(collection, None, |_| true))
    }

    async fn list_page(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        self.begin_read()?;
        Ok(self.collect(collection, Some(limit), |_| true))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, StoreError> {
        self.begin_read()?;
        Ok(self.collect(collection, None, |fields| {
            filters.iter().all(|filter| filter.matches(fields))
        }))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.begin_read()?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
            .map(|fields| Document::new(id, fields)))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.check_available()?;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.check_available()?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let existing = docs.entry(id.to_string()).or_default();
        for (key, value) in fields {
            existing.insert(key, value);
        }
        Ok(())
    }

    async fn delete_batch(&self, refs: &[DocumentRef]) -> Result<usize, StoreError> {
        self.check_available()?;

        let mut by_collection: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for doc_ref in refs {
            by_collection
                .entry(doc_ref.collection.as_str())
                .or_default()
                .push(doc_ref.id.as_str());
        }

        // Each collection's share of the batch is removed under one write guard
        let mut removed = 0;
        for (collection, ids) in by_collection {
            let emptied = match self.collections.get_mut(collection) {
                Some(mut docs) => {
                    removed += ids.iter().filter(|id| docs.remove(**id).is_some()).count();
                    docs.is_empty()
                }
                None => false,
            };

            // Drop collections emptied by the batch so listings stay cheap
            if emptied {
                self.collections.remove_if(collection, |_, docs| docs.is_empty());
            }
        }

        Ok(removed)
    }
}
