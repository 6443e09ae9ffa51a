//! Document storage abstraction.
//!
//! Each service keeps its authoritative entities and its replicas of foreign
//! entities as JSON documents keyed by `(collection, id)`. The store exposes
//! the primitive operations the replica projector and the order saga need,
//! including an atomic conditional counter adjustment so stock can never be
//! driven below zero by concurrent requests.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::DomainError;

/// A value stored in a named collection and identified by a UUID.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name inside the owning service's store.
    const COLLECTION: &'static str;

    /// The document identifier (equal to the authoritative identifier).
    fn id(&self) -> Uuid;
}

/// Outcome of [`DocumentStore::adjust_counter`].
#[derive(Debug, Clone, PartialEq)]
pub enum CounterAdjustment {
    /// The adjustment was applied; carries the updated document.
    Applied(Value),
    /// Applying the delta would have taken the counter below zero.
    Insufficient {
        /// The counter value at the time of the attempt.
        available: i64,
    },
    /// No document with that identifier exists.
    Missing,
}

/// Equality guard for conditional writes.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGuard {
    /// Top-level field to compare.
    pub field: String,
    /// Value the field must currently hold.
    pub equals: Value,
}

impl FieldGuard {
    /// Creates a guard requiring `field == equals`.
    #[must_use]
    pub fn new(field: impl Into<String>, equals: Value) -> Self {
        Self {
            field: field.into(),
            equals,
        }
    }

    /// Returns `true` if `doc` satisfies the guard.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        doc.get(&self.field) == Some(&self.equals)
    }
}

/// Shallow top-level merge of `patch` into `target`.
///
/// Non-object patches replace the target outright.
pub fn merge_json(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

/// Storage operations over JSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads one document.
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DomainError>;

    /// Loads every document in a collection.
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, DomainError>;

    /// Loads the first document whose top-level `field` equals `value`.
    async fn find_one_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Value>, DomainError>;

    /// Inserts `doc` unless a document with `id` exists. Returns `true` if inserted.
    async fn insert_if_absent(
        &self,
        collection: &str,
        id: Uuid,
        doc: Value,
    ) -> Result<bool, DomainError>;

    /// Merges `patch` into an existing document. Returns `None` if absent.
    async fn merge(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<Value>, DomainError>;

    /// Merges `patch` into the document if it satisfies `guard`.
    /// Returns `None` if the document is absent or the guard fails.
    async fn merge_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
        patch: Value,
    ) -> Result<Option<Value>, DomainError>;

    /// Merges `patch` into the document, inserting it if absent.
    async fn upsert(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, DomainError>;

    /// Stores `doc` in full, replacing any existing document.
    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DomainError>;

    /// Removes a document. Returns `true` if it existed.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, DomainError>;

    /// Removes a document if it satisfies `guard`. Returns `true` if removed.
    async fn delete_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
    ) -> Result<bool, DomainError>;

    /// Atomically adds `delta` to the integer `field`, only if the result
    /// stays at or above zero.
    async fn adjust_counter(
        &self,
        collection: &str,
        id: Uuid,
        field: &str,
        delta: i64,
    ) -> Result<CounterAdjustment, DomainError>;

    /// Returns `true` if `consumer` already applied `message_id`.
    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool, DomainError>;

    /// Records that `consumer` applied `message_id`.
    async fn record_processed(&self, consumer: &str, message_id: Uuid)
    -> Result<(), DomainError>;
}

fn to_value<T: Serialize>(doc: &T) -> Result<Value, DomainError> {
    serde_json::to_value(doc)
        .map_err(|e| DomainError::Infrastructure(format!("document serialization failed: {e}")))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, DomainError> {
    serde_json::from_value(value)
        .map_err(|e| DomainError::Infrastructure(format!("document deserialization failed: {e}")))
}

/// Typed view over one collection of a [`DocumentStore`].
pub struct Collection<'a, T> {
    store: &'a dyn DocumentStore,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Document> Collection<'a, T> {
    /// Creates a typed view of `T::COLLECTION` in `store`.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Loads one document.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage or decoding failure.
    pub async fn find(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        self.store
            .find(T::COLLECTION, id)
            .await?
            .map(from_value)
            .transpose()
    }

    /// Loads every document in the collection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage or decoding failure.
    pub async fn find_all(&self) -> Result<Vec<T>, DomainError> {
        self.store
            .find_all(T::COLLECTION)
            .await?
            .into_iter()
            .map(from_value)
            .collect()
    }

    /// Loads the first document whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage or decoding failure.
    pub async fn find_one_by(&self, field: &str, value: &Value) -> Result<Option<T>, DomainError> {
        self.store
            .find_one_by(T::COLLECTION, field, value)
            .await?
            .map(from_value)
            .transpose()
    }

    /// Inserts `doc` unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn insert_if_absent(&self, doc: &T) -> Result<bool, DomainError> {
        self.store
            .insert_if_absent(T::COLLECTION, doc.id(), to_value(doc)?)
            .await
    }

    /// Merges `doc` into the stored document, if present.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage or decoding failure.
    pub async fn merge(&self, doc: &T) -> Result<Option<T>, DomainError> {
        self.store
            .merge(T::COLLECTION, doc.id(), to_value(doc)?)
            .await?
            .map(from_value)
            .transpose()
    }

    /// Merges a raw `patch` into the document with `id` if `guard` holds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage or decoding failure.
    pub async fn merge_if(
        &self,
        id: Uuid,
        guard: &FieldGuard,
        patch: Value,
    ) -> Result<Option<T>, DomainError> {
        self.store
            .merge_if(T::COLLECTION, id, guard, patch)
            .await?
            .map(from_value)
            .transpose()
    }

    /// Merges `doc` into the stored document, inserting it if absent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage or decoding failure.
    pub async fn upsert(&self, doc: &T) -> Result<T, DomainError> {
        from_value(
            self.store
                .upsert(T::COLLECTION, doc.id(), to_value(doc)?)
                .await?,
        )
    }

    /// Stores `doc` in full.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn replace(&self, doc: &T) -> Result<(), DomainError> {
        self.store
            .replace(T::COLLECTION, doc.id(), to_value(doc)?)
            .await
    }

    /// Removes the document with `id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        self.store.delete(T::COLLECTION, id).await
    }

    /// Removes the document with `id` if `guard` holds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn delete_if(&self, id: Uuid, guard: &FieldGuard) -> Result<bool, DomainError> {
        self.store.delete_if(T::COLLECTION, id, guard).await
    }

    /// Atomically adjusts an integer field, refusing to go below zero.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn adjust_counter(
        &self,
        id: Uuid,
        field: &str,
        delta: i64,
    ) -> Result<CounterAdjustment, DomainError> {
        self.store
            .adjust_counter(T::COLLECTION, id, field, delta)
            .await
    }
}

/// Decodes the document carried by [`CounterAdjustment::Applied`].
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the document does not decode.
pub fn decode_document<T: Document>(value: Value) -> Result<T, DomainError> {
    from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_overwrites_and_keeps_untouched_fields() {
        let mut target = json!({ "id": "a", "stock": 5, "title": "lamp" });

        merge_json(&mut target, &json!({ "stock": 3, "brand": "acme" }));

        assert_eq!(
            target,
            json!({ "id": "a", "stock": 3, "title": "lamp", "brand": "acme" })
        );
    }

    #[test]
    fn test_merge_json_replaces_non_objects() {
        let mut target = json!([1, 2]);

        merge_json(&mut target, &json!({ "a": 1 }));

        assert_eq!(target, json!({ "a": 1 }));
    }

    #[test]
    fn test_field_guard_matches_exact_value() {
        let guard = FieldGuard::new("status", json!("pending"));

        assert!(guard.matches(&json!({ "status": "pending" })));
        assert!(!guard.matches(&json!({ "status": "shipped" })));
        assert!(!guard.matches(&json!({})));
    }
}
