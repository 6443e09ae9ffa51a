//! Document store test doubles.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use emporium_core::document::{CounterAdjustment, DocumentStore, FieldGuard};
use emporium_core::error::DomainError;
use emporium_store::MemoryDocumentStore;
use serde_json::Value;
use uuid::Uuid;

fn refused<T>() -> Result<T, DomainError> {
    Err(DomainError::Infrastructure("connection refused".into()))
}

/// A document store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingDocumentStore;

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn find(&self, _collection: &str, _id: Uuid) -> Result<Option<Value>, DomainError> {
        refused()
    }

    async fn find_all(&self, _collection: &str) -> Result<Vec<Value>, DomainError> {
        refused()
    }

    async fn find_one_by(
        &self,
        _collection: &str,
        _field: &str,
        _value: &Value,
    ) -> Result<Option<Value>, DomainError> {
        refused()
    }

    async fn insert_if_absent(
        &self,
        _collection: &str,
        _id: Uuid,
        _doc: Value,
    ) -> Result<bool, DomainError> {
        refused()
    }

    async fn merge(
        &self,
        _collection: &str,
        _id: Uuid,
        _patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        refused()
    }

    async fn merge_if(
        &self,
        _collection: &str,
        _id: Uuid,
        _guard: &FieldGuard,
        _patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        refused()
    }

    async fn upsert(
        &self,
        _collection: &str,
        _id: Uuid,
        _patch: Value,
    ) -> Result<Value, DomainError> {
        refused()
    }

    async fn replace(&self, _collection: &str, _id: Uuid, _doc: Value) -> Result<(), DomainError> {
        refused()
    }

    async fn delete(&self, _collection: &str, _id: Uuid) -> Result<bool, DomainError> {
        refused()
    }

    async fn delete_if(
        &self,
        _collection: &str,
        _id: Uuid,
        _guard: &FieldGuard,
    ) -> Result<bool, DomainError> {
        refused()
    }

    async fn adjust_counter(
        &self,
        _collection: &str,
        _id: Uuid,
        _field: &str,
        _delta: i64,
    ) -> Result<CounterAdjustment, DomainError> {
        refused()
    }

    async fn is_processed(&self, _consumer: &str, _message_id: Uuid) -> Result<bool, DomainError> {
        refused()
    }

    async fn record_processed(
        &self,
        _consumer: &str,
        _message_id: Uuid,
    ) -> Result<(), DomainError> {
        refused()
    }
}

/// An in-memory store whose writes fail a fixed number of times before
/// succeeding. Reads always succeed.
#[derive(Debug)]
pub struct FlakyDocumentStore {
    inner: MemoryDocumentStore,
    failures_left: AtomicU32,
}

impl FlakyDocumentStore {
    /// Creates a store whose first `failures` writes fail.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            failures_left: AtomicU32::new(failures),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    fn trip(&self) -> Result<(), DomainError> {
        let tripped = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if tripped { refused() } else { Ok(()) }
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DomainError> {
        self.inner.find(collection, id).await
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, DomainError> {
        self.inner.find_all(collection).await
    }

    async fn find_one_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Value>, DomainError> {
        self.inner.find_one_by(collection, field, value).await
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        id: Uuid,
        doc: Value,
    ) -> Result<bool, DomainError> {
        self.trip()?;
        self.inner.insert_if_absent(collection, id, doc).await
    }

    async fn merge(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        self.trip()?;
        self.inner.merge(collection, id, patch).await
    }

    async fn merge_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
        patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        self.trip()?;
        self.inner.merge_if(collection, id, guard, patch).await
    }

    async fn upsert(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, DomainError> {
        self.trip()?;
        self.inner.upsert(collection, id, patch).await
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DomainError> {
        self.trip()?;
        self.inner.replace(collection, id, doc).await
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, DomainError> {
        self.trip()?;
        self.inner.delete(collection, id).await
    }

    async fn delete_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
    ) -> Result<bool, DomainError> {
        self.trip()?;
        self.inner.delete_if(collection, id, guard).await
    }

    async fn adjust_counter(
        &self,
        collection: &str,
        id: Uuid,
        field: &str,
        delta: i64,
    ) -> Result<CounterAdjustment, DomainError> {
        self.trip()?;
        self.inner.adjust_counter(collection, id, field, delta).await
    }

    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool, DomainError> {
        self.inner.is_processed(consumer, message_id).await
    }

    async fn record_processed(
        &self,
        consumer: &str,
        message_id: Uuid,
    ) -> Result<(), DomainError> {
        self.inner.record_processed(consumer, message_id).await
    }
}
