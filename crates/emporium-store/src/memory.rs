//! In-memory `DocumentStore`.
//!
//! Every write takes the collection lock for the whole read-modify-write, so
//! guarded writes and counter adjustments are atomic with respect to each
//! other exactly as the single-statement SQL versions are.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use emporium_core::document::{CounterAdjustment, DocumentStore, FieldGuard, merge_json};
use emporium_core::error::DomainError;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

type Collections = HashMap<String, BTreeMap<Uuid, Value>>;

/// A process-local document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
    processed: RwLock<HashSet<(String, Uuid)>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

fn read_counter(doc: &Value, field: &str) -> Result<i64, DomainError> {
    doc.get(field).and_then(Value::as_i64).ok_or_else(|| {
        warn!(field, "counter field is missing or not an integer");
        DomainError::Infrastructure(format!("field {field} is not an integer"))
    })
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DomainError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(&id))
            .cloned())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, DomainError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Value>, DomainError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.values().find(|doc| doc.get(field) == Some(value)))
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        id: Uuid,
        doc: Value,
    ) -> Result<bool, DomainError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();
        if docs.contains_key(&id) {
            return Ok(false);
        }
        docs.insert(id, doc);
        Ok(true)
    }

    async fn merge(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(&id))
            .map(|doc| {
                merge_json(doc, &patch);
                doc.clone()
            }))
    }

    async fn merge_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
        patch: Value,
    ) -> Result<Option<Value>, DomainError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(&id))
            .filter(|doc| guard.matches(doc))
            .map(|doc| {
                merge_json(doc, &patch);
                doc.clone()
            }))
    }

    async fn upsert(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, DomainError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();
        let doc = docs
            .entry(id)
            .and_modify(|doc| merge_json(doc, &patch))
            .or_insert_with(|| patch.clone());
        Ok(doc.clone())
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DomainError> {
        self.collections
            .write()
            .await
            .entry(collection.to_owned())
            .or_default()
            .insert(id, doc);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, DomainError> {
        Ok(self
            .collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|docs| docs.remove(&id))
            .is_some())
    }

    async fn delete_if(
        &self,
        collection: &str,
        id: Uuid,
        guard: &FieldGuard,
    ) -> Result<bool, DomainError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        if docs.get(&id).is_some_and(|doc| guard.matches(doc)) {
            docs.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn adjust_counter(
        &self,
        collection: &str,
        id: Uuid,
        field: &str,
        delta: i64,
    ) -> Result<CounterAdjustment, DomainError> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(&id))
        else {
            return Ok(CounterAdjustment::Missing);
        };

        let current = read_counter(doc, field)?;
        let Some(next) = current.checked_add(delta) else {
            warn!(field, current, delta, "counter adjustment out of range");
            return Err(DomainError::Validation(format!(
                "adjusting {field} by {delta} is out of range"
            )));
        };
        if next < 0 {
            return Ok(CounterAdjustment::Insufficient { available: current });
        }
        let mut patch = serde_json::Map::new();
        patch.insert(field.to_owned(), Value::from(next));
        merge_json(doc, &Value::Object(patch));
        Ok(CounterAdjustment::Applied(doc.clone()))
    }

    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool, DomainError> {
        Ok(self
            .processed
            .read()
            .await
            .contains(&(consumer.to_owned(), message_id)))
    }

    async fn record_processed(
        &self,
        consumer: &str,
        message_id: Uuid,
    ) -> Result<(), DomainError> {
        self.processed
            .write()
            .await
            .insert((consumer.to_owned(), message_id));
        Ok(())
    }
}
