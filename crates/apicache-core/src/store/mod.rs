//! Persistent store seam.
//!
//! A small object-store contract: named collections of JSON records keyed
//! by a string at the collection's key path, with secondary indices that can
//! be enumerated in order. Multi-record operations are atomic.
//!
//! Consumers never reach for a process-wide instance; they receive a
//! [`StoreHandle`] at construction. A handle can start uninitialized and be
//! filled in later, and reading it before then is [`StoreError::Unavailable`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{StoreError, StoreResult};

pub mod schema;
pub mod sqlite;

pub use schema::{CollectionSchema, API_CACHE, API_CACHE_TIMESTAMP_INDEX};
pub use sqlite::SqliteStore;

/// Object-store contract.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a record by primary key.
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Insert or replace a record. The key is read from the record.
    async fn put(&self, collection: &str, record: Value) -> StoreResult<()>;

    /// Delete a record. Deleting an absent key succeeds.
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()>;

    /// Delete every record in a collection.
    async fn clear(&self, collection: &str) -> StoreResult<()>;

    /// All records in primary-key order.
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// All records ordered by a declared secondary index.
    async fn get_all_from_index(&self, collection: &str, index: &str) -> StoreResult<Vec<Value>>;

    /// Delete a set of keys in one transaction.
    async fn delete_many(&self, collection: &str, keys: &[String]) -> StoreResult<()>;

    /// Replace the contents of a collection in one transaction.
    async fn replace_all(&self, collection: &str, records: Vec<Value>) -> StoreResult<()>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> StoreResult<usize>;
}

/// Injected, possibly not-yet-initialized store reference.
///
/// Clones share the same slot, so initializing one initializes all.
#[derive(Clone, Default)]
pub struct StoreHandle {
    slot: Arc<OnceCell<Arc<dyn Store>>>,
}

impl StoreHandle {
    /// A handle that is ready immediately.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            slot: Arc::new(OnceCell::new_with(Some(store))),
        }
    }

    /// A handle whose store will be provided later.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Provide the store. Fails if the handle was already initialized.
    pub fn initialize(&self, store: Arc<dyn Store>) -> StoreResult<()> {
        self.slot
            .set(store)
            .map_err(|_| StoreError::Database("store already initialized".to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.initialized()
    }

    /// The store, or [`StoreError::Unavailable`].
    pub fn get(&self) -> StoreResult<&Arc<dyn Store>> {
        self.slot.get().ok_or(StoreError::Unavailable)
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
