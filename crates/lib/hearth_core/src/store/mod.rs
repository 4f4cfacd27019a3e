//! Record storage.
//!
//! [`RecordStore`] is the seam between request flows and persistence. The
//! crate ships [`MemoryStore`]; [`StagedStore`] layers uncommitted writes
//! over any other store to implement transactions.

mod memory;
mod staged;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Collection, Record};

pub use memory::MemoryStore;
pub use staged::StagedStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage: {0}")]
    Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Collection and record persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a collection by name or id.
    async fn find_collection_by_name_or_id(&self, name_or_id: &str) -> StoreResult<Collection>;

    async fn find_record_by_id(&self, collection_id: &str, id: &str) -> StoreResult<Record>;

    /// Case-insensitive email lookup within one auth collection.
    async fn find_auth_record_by_email(
        &self,
        collection_id: &str,
        email: &str,
    ) -> StoreResult<Option<Record>>;

    /// Insert or replace every record, all or nothing.
    async fn save_records(&self, records: Vec<Record>) -> StoreResult<()>;
}

/// Case-insensitive email equality; blank emails never match.
pub(crate) fn same_email(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}
