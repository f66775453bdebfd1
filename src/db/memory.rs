use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::store::{Collection, Document, Filter, Record, RecordStore};
use crate::error::StoreError;

/// Process-local store. Records keep insertion order and uniqueness is checked
/// under the write lock, so concurrent duplicate inserts cannot both succeed.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<Collection, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|records| records.iter().find(|r| filter.matches(r)))
            .cloned())
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Uuid, StoreError> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();

        let key = collection.unique_key();
        if let Some(value) = document.get(key) {
            if records.iter().any(|r| r.document.get(key) == Some(value)) {
                return Err(collection.duplicate());
            }
        }

        let id = Uuid::new_v4();
        records.push(Record { id, document });
        Ok(id)
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        match records.iter().position(|r| filter.matches(r)) {
            Some(index) => {
                records.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
