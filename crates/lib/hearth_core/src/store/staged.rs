//! Write-staging overlay used for transactions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{RecordStore, StoreError, StoreResult, same_email};
use crate::models::{Collection, Record};

/// Buffers record writes over a parent store.
///
/// Reads see staged writes first. [`StagedStore::commit`] flushes the whole
/// buffer to the parent with a single [`RecordStore::save_records`] call;
/// [`StagedStore::rollback`] discards it. Once closed, further writes fail.
pub struct StagedStore {
    parent: Arc<dyn RecordStore>,
    staged: Mutex<HashMap<(String, String), Record>>,
    closed: AtomicBool,
}

impl StagedStore {
    pub fn new(parent: Arc<dyn RecordStore>) -> Self {
        Self {
            parent,
            staged: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn staged(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Record>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of records waiting for commit.
    pub fn pending(&self) -> usize {
        self.staged().len()
    }

    /// Flush staged writes to the parent store atomically.
    pub async fn commit(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Internal("transaction already closed".into()));
        }
        let batch: Vec<Record> = self.staged().drain().map(|(_, r)| r).collect();
        if batch.is_empty() {
            return Ok(());
        }
        self.parent.save_records(batch).await
    }

    /// Discard staged writes.
    pub fn rollback(&self) {
        self.closed.store(true, Ordering::Release);
        self.staged().clear();
    }
}

#[async_trait]
impl RecordStore for StagedStore {
    async fn find_collection_by_name_or_id(&self, name_or_id: &str) -> StoreResult<Collection> {
        self.parent.find_collection_by_name_or_id(name_or_id).await
    }

    async fn find_record_by_id(&self, collection_id: &str, id: &str) -> StoreResult<Record> {
        let staged = self
            .staged()
            .get(&(collection_id.to_string(), id.to_string()))
            .cloned();
        match staged {
            Some(record) => Ok(record),
            None => self.parent.find_record_by_id(collection_id, id).await,
        }
    }

    async fn find_auth_record_by_email(
        &self,
        collection_id: &str,
        email: &str,
    ) -> StoreResult<Option<Record>> {
        let (hit, shadowed) = {
            let staged = self.staged();
            let hit = staged
                .values()
                .find(|r| r.collection_id == collection_id && same_email(&r.email, email))
                .cloned();
            let shadowed: Vec<(String, String)> = staged.keys().cloned().collect();
            (hit, shadowed)
        };
        if hit.is_some() {
            return Ok(hit);
        }
        // A parent match whose staged copy changed email no longer matches.
        let found = self
            .parent
            .find_auth_record_by_email(collection_id, email)
            .await?;
        Ok(found.filter(|r| !shadowed.contains(&r.key())))
    }

    async fn save_records(&self, records: Vec<Record>) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Internal("transaction already closed".into()));
        }
        let mut staged = self.staged();
        for record in records {
            staged.insert(record.key(), record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seeded() -> (Arc<MemoryStore>, Collection, Record) {
        let store = Arc::new(MemoryStore::new());
        let users = Collection::new_auth("users");
        let mut record = Record::new(&users);
        record.email = "test@example.com".into();
        store.insert_collection(users.clone());
        store.insert_record(record.clone());
        (store, users, record)
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let (parent, users, mut record) = seeded();
        let staged = StagedStore::new(parent.clone());

        record.verified = true;
        staged.save_records(vec![record.clone()]).await.unwrap();

        assert!(staged.find_record_by_id(&users.id, &record.id).await.unwrap().verified);
        assert!(!parent.find_record_by_id(&users.id, &record.id).await.unwrap().verified);

        staged.commit().await.unwrap();
        assert!(parent.find_record_by_id(&users.id, &record.id).await.unwrap().verified);
    }

    #[tokio::test]
    async fn rollback_discards_and_closes() {
        let (parent, users, mut record) = seeded();
        let staged = StagedStore::new(parent.clone());

        record.verified = true;
        staged.save_records(vec![record.clone()]).await.unwrap();
        staged.rollback();

        assert_eq!(staged.pending(), 0);
        assert!(!parent.find_record_by_id(&users.id, &record.id).await.unwrap().verified);
        assert!(staged.save_records(vec![record]).await.is_err());
    }

    #[tokio::test]
    async fn email_lookup_sees_staged_changes() {
        let (parent, users, mut record) = seeded();
        let staged = StagedStore::new(parent);

        record.email = "new@example.com".into();
        staged.save_records(vec![record.clone()]).await.unwrap();

        assert!(
            staged
                .find_auth_record_by_email(&users.id, "test@example.com")
                .await
                .unwrap()
                .is_none()
        );
        let found = staged
            .find_auth_record_by_email(&users.id, "new@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
    }
}
