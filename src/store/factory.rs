//! Document store factory

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;

use super::backend::{DocumentStore, StoreError};
use super::memory_backend::MemoryDocumentStore;
use super::postgres_backend::PostgresDocumentStore;

/// Create a document store based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"postgres"`: Returns a `PostgresDocumentStore` if a PostgreSQL pool is provided
/// - `"memory"` (default): Returns a `MemoryDocumentStore`
///
/// The PostgreSQL schema is created on first use.
pub async fn create_document_store(
    settings: &StoreConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    database = %pool.database_url_masked(),
                    "Creating PostgreSQL document store"
                );
                let store = PostgresDocumentStore::new(pool.pool().clone());
                store.ensure_schema().await?;
                Ok(Arc::new(store))
            } else {
                tracing::warn!(
                    "PostgreSQL store requested but no pool provided, falling back to memory"
                );
                Ok(Arc::new(MemoryDocumentStore::new()))
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_is_default() {
        let store = create_document_store(&StoreConfig::default(), None)
            .await
            .unwrap();
        assert_eq!(store.backend_type(), "memory");
    }

    #[tokio::test]
    async fn test_postgres_without_pool_falls_back() {
        let config = StoreConfig {
            backend: "postgres".to_string(),
            ..StoreConfig::default()
        };
        let store = create_document_store(&config, None).await.unwrap();
        assert_eq!(store.backend_type(), "memory");
    }
}
