use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, Document, Store, StoreError, document_id};
use crate::{id::RecordId, models::VERSION, query::Selection};

type Records = BTreeMap<RecordId, Document>;

/// Process-local engine. Keys iterate in ascending order, which for
/// generated keys is creation order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Records>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, StoreError> {
        let id = document_id(collection, &document)?;
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();

        if records.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.name(),
                id,
            });
        }

        records.insert(id, document.clone());
        Ok(document)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(&collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn find_by_ids(
        &self,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn find(
        &self,
        collection: Collection,
        selection: &Selection,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(&collection)
            .map(|records| selection.apply(records.values()))
            .unwrap_or_default())
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
        fields: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(&collection)
            .and_then(|records| records.get_mut(id))
        else {
            return Ok(None);
        };

        for (key, value) in fields {
            document.insert(key, value);
        }

        Ok(Some(document.clone()))
    }

    async fn push_unique(
        &self,
        collection: Collection,
        id: &RecordId,
        field: &str,
        value: Value,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(&collection)
            .and_then(|records| records.get_mut(id))
        else {
            return Ok(None);
        };

        let items = document
            .entry(field)
            .or_insert_with(|| Value::Array(Vec::new()));

        let Value::Array(items) = items else {
            return Err(StoreError::NotAnArray {
                id: id.clone(),
                field: field.to_string(),
            });
        };

        if !items.contains(&value) {
            items.push(value);

            let version = document.get(VERSION).and_then(Value::as_u64).unwrap_or(0);
            document.insert(VERSION.to_string(), Value::from(version + 1));
        }

        Ok(Some(document.clone()))
    }

    async fn delete_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;

        Ok(collections
            .get_mut(&collection)
            .and_then(|records| records.remove(id)))
    }
}
