//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use apicache_core::{
    ApiClient, ClientConfig, ManualClock, SqliteStore, Store, StoreError, StoreHandle,
    StoreResult,
};
use async_trait::async_trait;
use serde_json::Value;
use wiremock::MockServer;

/// SQLite store whose operations can be made to fail on demand.
#[derive(Default)]
pub struct Faults {
    pub get: AtomicBool,
    pub put: AtomicBool,
    pub clear: AtomicBool,
    pub delete_many: AtomicBool,
}

pub struct FlakyStore {
    inner: SqliteStore,
    pub faults: Arc<Faults>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::memory().expect("in-memory store"),
            faults: Arc::new(Faults::default()),
        }
    }
}

fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Database(format!("injected {} failure", what)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        check(&self.faults.get, "get")?;
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: &str, record: Value) -> StoreResult<()> {
        check(&self.faults.put, "put")?;
        self.inner.put(collection, record).await
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        self.inner.delete(collection, key).await
    }

    async fn clear(&self, collection: &str) -> StoreResult<()> {
        check(&self.faults.clear, "clear")?;
        self.inner.clear(collection).await
    }

    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.inner.get_all(collection).await
    }

    async fn get_all_from_index(&self, collection: &str, index: &str) -> StoreResult<Vec<Value>> {
        self.inner.get_all_from_index(collection, index).await
    }

    async fn delete_many(&self, collection: &str, keys: &[String]) -> StoreResult<()> {
        check(&self.faults.delete_many, "delete_many")?;
        self.inner.delete_many(collection, keys).await
    }

    async fn replace_all(&self, collection: &str, records: Vec<Value>) -> StoreResult<()> {
        self.inner.replace_all(collection, records).await
    }

    async fn count(&self, collection: &str) -> StoreResult<usize> {
        self.inner.count(collection).await
    }
}

/// Client against a mock server with an in-memory store and a manual clock.
pub fn test_client(mock_server: &MockServer, clock: &ManualClock) -> ApiClient {
    test_client_with(mock_server, clock, ClientConfig::default())
}

pub fn test_client_with(
    mock_server: &MockServer,
    clock: &ManualClock,
    config: ClientConfig,
) -> ApiClient {
    let store = SqliteStore::memory().expect("in-memory store");
    ApiClient::builder()
        .config(config.with_base_url(mock_server.uri()))
        .store(StoreHandle::new(Arc::new(store)))
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("failed to create client")
}

/// Client backed by a [`FlakyStore`]; returns the fault switches too.
pub fn flaky_client(mock_server: &MockServer, clock: &ManualClock) -> (ApiClient, Arc<Faults>) {
    let store = FlakyStore::new();
    let faults = store.faults.clone();
    let client = ApiClient::builder()
        .config(ClientConfig::default().with_base_url(mock_server.uri()))
        .store(StoreHandle::new(Arc::new(store)))
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("failed to create client");
    (client, faults)
}
