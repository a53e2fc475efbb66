//! Document store used by the recipient resolver and the trigger handlers.
//!
//! Two backends are available:
//!
//! - `MemoryDocumentStore`: DashMap-backed, for development and tests
//! - `PostgresDocumentStore`: JSONB documents table
//!
//! Use `create_document_store()` to pick one from configuration.

mod backend;
mod factory;
mod memory_backend;
mod postgres_backend;

pub use backend::{
    format_timestamp, Document, DocumentRef, DocumentStore, FieldFilter, Fields, FilterOp,
    StoreError,
};
pub use factory::create_document_store;
pub use memory_backend::MemoryDocumentStore;
pub use postgres_backend::PostgresDocumentStore;
