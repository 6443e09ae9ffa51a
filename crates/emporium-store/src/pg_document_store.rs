//! `PostgreSQL` implementation of the `DocumentStore` trait.
//!
//! All collections share the `documents` table. Guarded writes and counter
//! adjustments are single `UPDATE ... WHERE` statements so concurrent
//! requests cannot interleave between the check and the write.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use emporium_core::document::{CounterAdjustment, DocumentStore, FieldGuard};
use emporium_core::error::DomainError;

/// PostgreSQL-backed document store.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn infra(err: sqlx::Error) -> DomainError {
    error!(error = %err, "document store query failed");
    DomainError::Infrastructure(format!("document store error: {err}"))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DomainError> {
        sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, DomainError> {
        sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 ORDER BY updated_at, id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)
    }

    async fn find_one_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Value>, DomainError> {
        let mut containment = serde_json::Map::new();
        containment.insert(field.to_owned(), value.clone());

        sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND body @> $2 LIMIT 1",
        )
        .bind(collection)
        .bind(Value::Object(containment))
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        id: Uuid,
        doc: Value,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(infra)?;

        Ok(result.rows_affected() == 1)
    }

    async fn merge(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        sqlx::query_scalar::<_, Value>(
            "UPDATE documents SET body = body || $3, updated_at = NOW() \
             WHERE collection = $1 AND id = $2 RETURNING body",
        )
        .bind(collection)
        .bind(id)
        .bind(patch)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)
    }

    async fn merge_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
        patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        sqlx::query_scalar::<_, Value>(
            "UPDATE documents SET body = body || $3, updated_at = NOW() \
             WHERE collection = $1 AND id = $2 AND body -> $4 = $5 RETURNING body",
        )
        .bind(collection)
        .bind(id)
        .bind(patch)
        .bind(&guard.field)
        .bind(&guard.equals)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)
    }

    async fn upsert(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, DomainError> {
        sqlx::query_scalar::<_, Value>(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) \
             DO UPDATE SET body = documents.body || EXCLUDED.body, updated_at = NOW() \
             RETURNING body",
        )
        .bind(collection)
        .bind(id)
        .bind(patch)
        .fetch_one(&self.pool)
        .await
        .map_err(infra)
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) \
             DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()",
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(infra)?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 AND body -> $3 = $4",
        )
        .bind(collection)
        .bind(id)
        .bind(&guard.field)
        .bind(&guard.equals)
        .execute(&self.pool)
        .await
        .map_err(infra)?;

        Ok(result.rows_affected() == 1)
    }

    async fn adjust_counter(
        &self,
        collection: &str,
        id: Uuid,
        field: &str,
        delta: i64,
    ) -> Result<CounterAdjustment, DomainError> {
        let applied = sqlx::query_scalar::<_, Value>(
            "UPDATE documents \
             SET body = jsonb_set(body, ARRAY[$3::text], to_jsonb((body ->> $3)::bigint + $4)), \
                 updated_at = NOW() \
             WHERE collection = $1 AND id = $2 AND (body ->> $3)::bigint + $4 >= 0 \
             RETURNING body",
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;

        if let Some(body) = applied {
            return Ok(CounterAdjustment::Applied(body));
        }

        let current = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT (body ->> $3)::bigint FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;

        Ok(match current {
            None => CounterAdjustment::Missing,
            Some(available) => CounterAdjustment::Insufficient {
                available: available.unwrap_or(0),
            },
        })
    }

    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS \
             (SELECT 1 FROM processed_messages WHERE consumer = $1 AND message_id = $2)",
        )
        .bind(consumer)
        .bind(message_id)
        .fetch_one(&self.pool)
        .await
        .map_err(infra)
    }

    async fn record_processed(
        &self,
        consumer: &str,
        message_id: Uuid,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO processed_messages (consumer, message_id) VALUES ($1, $2) \
             ON CONFLICT (consumer, message_id) DO NOTHING",
        )
        .bind(consumer)
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(infra)?;

        Ok(())
    }
}
