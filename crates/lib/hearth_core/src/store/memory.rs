//! In-memory record store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{RecordStore, StoreError, StoreResult, same_email};
use crate::models::{Collection, Record};

type RecordKey = (String, String);

/// Process-local store backed by hash maps.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Vec<Collection>>,
    records: RwLock<HashMap<RecordKey, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a collection (matched by id).
    pub fn insert_collection(&self, collection: Collection) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections.retain(|c| c.id != collection.id);
        collections.push(collection);
    }

    /// Insert a record directly, bypassing constraint checks.
    pub fn insert_record(&self, record: Record) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.key(), record);
    }

    pub fn record_count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_collection_by_name_or_id(&self, name_or_id: &str) -> StoreResult<Collection> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.matches(name_or_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("collection {name_or_id} not found")))
    }

    async fn find_record_by_id(&self, collection_id: &str, id: &str) -> StoreResult<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection_id.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {id} not found")))
    }

    async fn find_auth_record_by_email(
        &self,
        collection_id: &str,
        email: &str,
    ) -> StoreResult<Option<Record>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|r| r.collection_id == collection_id && same_email(&r.email, email))
            .cloned())
    }

    async fn save_records(&self, records: Vec<Record>) -> StoreResult<()> {
        let known: Vec<String> = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let mut stored = self.records.write().unwrap_or_else(PoisonError::into_inner);

        // Validate the whole batch before touching anything.
        for (i, record) in records.iter().enumerate() {
            if !known.contains(&record.collection_id) {
                return Err(StoreError::NotFound(format!(
                    "collection {} not found",
                    record.collection_id
                )));
            }
            let batch_clash = records[..i].iter().any(|other| {
                other.collection_id == record.collection_id
                    && other.id != record.id
                    && same_email(&other.email, &record.email)
            });
            let stored_clash = stored.values().any(|other| {
                other.collection_id == record.collection_id
                    && other.id != record.id
                    && same_email(&other.email, &record.email)
                    && !records.iter().any(|r| r.key() == other.key())
            });
            if batch_clash || stored_clash {
                return Err(StoreError::Conflict(format!(
                    "email {} is already in use",
                    record.email
                )));
            }
        }

        for record in records {
            stored.insert(record.key(), record);
        }
        Ok(())
    }
}
