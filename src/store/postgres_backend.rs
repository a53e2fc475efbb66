//! PostgreSQL-based document store backend.
//!
//! Documents live in a single table keyed by `(collection, id)` with the
//! fields held as JSONB, so collection paths (including sub-collections)
//! need no schema of their own.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::backend::{
    Document, DocumentRef, DocumentStore, FieldFilter, Fields, FilterOp, StoreError,
};

const CREATE_DOCUMENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        data JSONB NOT NULL DEFAULT '{}'::jsonb,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (collection, id)
    )
"#;

/// PostgreSQL-based document store.
///
/// Table structure:
/// - `documents` - one row per document, fields in the `data` JSONB column
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `documents` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_DOCUMENTS_TABLE)
            .execute(&self.pool)
            .await?;
        tracing::debug!("Document store schema ensured");
        Ok(())
    }

    fn into_documents(rows: Vec<(String, Json<Fields>)>) -> Vec<Document> {
        rows.into_iter()
            .map(|(id, Json(fields))| Document::new(id, fields))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(String, Json<Fields>)> = sqlx::query_as(
            "SELECT id, data FROM documents WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::into_documents(rows))
    }

    async fn list_page(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(String, Json<Fields>)> = sqlx::query_as(
            "SELECT id, data FROM documents WHERE collection = $1 ORDER BY id LIMIT $2",
        )
        .bind(collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::into_documents(rows))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());

        for filter in filters {
            match filter.op {
                FilterOp::Eq => {
                    builder.push(" AND data -> ");
                    builder.push_bind(filter.field.clone());
                    builder.push(" = ");
                    builder.push_bind(Json(filter.value.clone()));
                }
                FilterOp::Lte => {
                    // jsonb orders across types; only compare like with like
                    builder.push(" AND jsonb_typeof(data -> ");
                    builder.push_bind(filter.field.clone());
                    builder.push(") = jsonb_typeof(");
                    builder.push_bind(Json(filter.value.clone()));
                    builder.push(") AND data -> ");
                    builder.push_bind(filter.field.clone());
                    builder.push(" <= ");
                    builder.push_bind(Json(filter.value.clone()));
                }
            }
        }
        builder.push(" ORDER BY id");

        let rows: Vec<(String, Json<Fields>)> =
            builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(Self::into_documents(rows))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<(String, Json<Fields>)> = sqlx::query_as(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, Json(fields))| Document::new(id, fields)))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id)
            DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_batch(&self, refs: &[DocumentRef]) -> Result<usize, StoreError> {
        if refs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut removed = 0usize;

        for doc_ref in refs {
            let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                .bind(&doc_ref.collection)
                .bind(&doc_ref.id)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }

        tx.commit().await?;

        tracing::trace!(requested = refs.len(), removed = removed, "Batch delete committed");

        Ok(removed)
    }
}
