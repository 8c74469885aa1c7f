//! Response cache adapter over the persistent store.
//!
//! Entries live in the `apiCache` collection:
//!
//! ```text
//! { "id": "GET-https://api.test/users-", "url": "https://api.test/users",
//!   "method": "GET", "data": <response body>, "timestamp": <ms since epoch> }
//! ```
//!
//! Freshness is not stored; it is decided at read time from the caller's TTL.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{StoreHandle, API_CACHE, API_CACHE_TIMESTAMP_INDEX};
use crate::types::Method;

/// Current export format version.
pub const EXPORT_VERSION: u32 = 1;

/// One cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Derived from `(method, url, body)`.
    pub id: String,

    /// Logical resource address. Not unique.
    pub url: String,

    pub method: Method,

    /// Cached response body.
    pub data: Value,

    /// Write time, ms since epoch.
    pub timestamp: i64,
}

impl CacheEntry {
    /// Fresh iff `now - timestamp < ttl_millis`.
    pub fn is_fresh(&self, now_millis: i64, ttl_millis: i64) -> bool {
        now_millis.saturating_sub(self.timestamp) < ttl_millis
    }
}

/// Summary of the cache contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
    pub distinct_urls: usize,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
}

/// Portable dump of the cache collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheExport {
    pub version: u32,
    pub exported_at: i64,
    pub entries: Vec<CacheEntry>,
}

/// Reads and writes cache entries.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: StoreHandle,
}

impl ResponseCache {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// The underlying store handle.
    pub fn handle(&self) -> &StoreHandle {
        &self.store
    }

    /// Whether a store is attached.
    pub fn is_available(&self) -> bool {
        self.store.is_initialized()
    }

    /// Look up an entry. A missing key is `Ok(None)`.
    pub async fn lookup(&self, id: &str) -> StoreResult<Option<CacheEntry>> {
        let store = self.store.get()?;
        let Some(record) = store.get(API_CACHE, id).await? else {
            return Ok(None);
        };
        let entry = serde_json::from_value(record).map_err(|e| StoreError::Corrupt {
            key: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(entry))
    }

    /// Insert or replace an entry.
    pub async fn store(&self, entry: &CacheEntry) -> StoreResult<()> {
        let store = self.store.get()?;
        let record = serde_json::to_value(entry)?;
        store.put(API_CACHE, record).await?;
        debug!(id = %entry.id, url = %entry.url, "cached response");
        Ok(())
    }

    /// Delete every entry whose `url` matches. Returns how many were removed.
    ///
    /// The matched keys are deleted in one transaction, so either all of
    /// them go or the call fails.
    pub async fn delete_where<F>(&self, url_matches: F) -> StoreResult<usize>
    where
        F: Fn(&str) -> bool,
    {
        let store = self.store.get()?;
        let records = store
            .get_all_from_index(API_CACHE, API_CACHE_TIMESTAMP_INDEX)
            .await?;

        let keys: Vec<String> = records
            .iter()
            .filter(|r| r.get("url").and_then(Value::as_str).is_some_and(&url_matches))
            .filter_map(|r| r.get("id").and_then(Value::as_str).map(String::from))
            .collect();

        store.delete_many(API_CACHE, &keys).await?;
        Ok(keys.len())
    }

    /// Drop every entry.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let store = self.store.get()?;
        store.clear(API_CACHE).await
    }

    /// All decodable entries, oldest first. Undecodable records are skipped.
    pub async fn list(&self) -> StoreResult<Vec<CacheEntry>> {
        let store = self.store.get()?;
        let records = store
            .get_all_from_index(API_CACHE, API_CACHE_TIMESTAMP_INDEX)
            .await?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<CacheEntry>(record) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "skipping undecodable cache record"),
            }
        }
        Ok(entries)
    }

    pub async fn stats(&self, now_millis: i64, ttl_millis: i64) -> StoreResult<CacheStats> {
        let entries = self.list().await?;

        let fresh = entries
            .iter()
            .filter(|e| e.is_fresh(now_millis, ttl_millis))
            .count();
        let mut urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        urls.sort_unstable();
        urls.dedup();

        Ok(CacheStats {
            entries: entries.len(),
            fresh,
            stale: entries.len() - fresh,
            distinct_urls: urls.len(),
            oldest: entries.iter().map(|e| e.timestamp).min(),
            newest: entries.iter().map(|e| e.timestamp).max(),
        })
    }

    pub async fn export(&self, now_millis: i64) -> StoreResult<CacheExport> {
        Ok(CacheExport {
            version: EXPORT_VERSION,
            exported_at: now_millis,
            entries: self.list().await?,
        })
    }

    /// Replace the cache contents with an export. Returns the entry count.
    pub async fn import(&self, export: CacheExport) -> StoreResult<usize> {
        if export.version != EXPORT_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported export version {} (expected {})",
                export.version, EXPORT_VERSION
            )));
        }

        let store = self.store.get()?;
        let count = export.entries.len();
        let records = export
            .entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        store.replace_all(API_CACHE, records).await?;
        info!(entries = count, "imported cache");
        Ok(count)
    }
}
