//! Request dispatch: cache check, network execution, cache write-back.
//!
//! Only cache-eligible GETs (caching enabled, store attached) touch the
//! cache. Cache faults on this path never reach the caller: a failed lookup
//! is a miss and a failed write is skipped. Network failures always reach
//! the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, ResponseCache};
use crate::clock::Clock;
use crate::error::{ApiError, ApiResult};
use crate::executor::NetworkExecutor;
use crate::key::derive_key_json;
use crate::types::{ApiRequest, ApiResponse};

type PendingFetch = Shared<BoxFuture<'static, ApiResult<ApiResponse>>>;

/// Routes requests between the cache and a network executor.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    executor: Arc<dyn NetworkExecutor>,
    cache: ResponseCache,
    clock: Arc<dyn Clock>,
    coalesce: bool,
    in_flight: Mutex<HashMap<String, PendingFetch>>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingFetch>> {
        self.in_flight.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache", &self.inner.cache)
            .field("coalesce", &self.inner.coalesce)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        executor: Arc<dyn NetworkExecutor>,
        cache: ResponseCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_coalescing(executor, cache, clock, false)
    }

    /// With `coalesce`, concurrent cache-eligible GETs for the same key
    /// share one network execution.
    pub fn with_coalescing(
        executor: Arc<dyn NetworkExecutor>,
        cache: ResponseCache,
        clock: Arc<dyn Clock>,
        coalesce: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                cache,
                clock,
                coalesce,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Serve a request from cache or network.
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let id = derive_key_json(request.method, &request.url, request.data.as_ref());
        let cacheable = request.is_cacheable() && self.inner.cache.is_available();

        if cacheable {
            if let Some(hit) = self.try_cache(&id, &request).await {
                return Ok(hit);
            }
            if self.inner.coalesce {
                return self.fetch_coalesced(id, request).await;
            }
        }

        self.fetch(&id, &request, cacheable).await
    }

    async fn try_cache(&self, id: &str, request: &ApiRequest) -> Option<ApiResponse> {
        match self.inner.cache.lookup(id).await {
            Ok(Some(entry)) => {
                let now = self.inner.clock.now_millis();
                if entry.is_fresh(now, request.ttl_millis()) {
                    debug!(
                        id,
                        url = %request.url,
                        age_ms = now.saturating_sub(entry.timestamp),
                        "cache hit"
                    );
                    Some(ApiResponse {
                        data: entry.data,
                        from_cache: true,
                        timestamp: entry.timestamp,
                    })
                } else {
                    debug!(
                        id,
                        url = %request.url,
                        age_ms = now.saturating_sub(entry.timestamp),
                        "cache entry stale"
                    );
                    None
                }
            }
            Ok(None) => {
                debug!(id, url = %request.url, "cache miss");
                None
            }
            Err(e) => {
                warn!(id, url = %request.url, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn fetch(&self, id: &str, request: &ApiRequest, cacheable: bool) -> ApiResult<ApiResponse> {
        let data = match self.inner.executor.execute(&request.to_network()).await {
            Ok(data) => data,
            Err(e) => {
                warn!(method = %request.method, url = %request.url, error = %e, "request failed");
                return Err(e);
            }
        };
        let timestamp = self.inner.clock.now_millis();

        if cacheable {
            let entry = CacheEntry {
                id: id.to_string(),
                url: request.url.clone(),
                method: request.method,
                data: data.clone(),
                timestamp,
            };
            if let Err(e) = self.inner.cache.store(&entry).await {
                warn!(id, url = %request.url, error = %e, "failed to cache response");
            }
        }

        Ok(ApiResponse {
            data,
            from_cache: false,
            timestamp,
        })
    }

    async fn fetch_coalesced(&self, id: String, request: ApiRequest) -> ApiResult<ApiResponse> {
        let pending = {
            let mut in_flight = self.inner.pending();
            if let Some(existing) = in_flight.get(&id) {
                debug!(id = %id, "joining in-flight request");
                existing.clone()
            } else {
                // The fetch runs on its own task so it finishes and deregisters
                // even when every waiter is dropped.
                let this = self.clone();
                let key = id.clone();
                let task = tokio::spawn(async move {
                    let result = this.fetch(&key, &request, true).await;
                    this.inner.pending().remove(&key);
                    result
                });
                let fut = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(ApiError::Network {
                            message: format!("coalesced fetch aborted: {}", e),
                        })
                    })
                }
                .boxed()
                .shared();
                in_flight.insert(id, fut.clone());
                fut
            }
        };

        pending.await
    }

    /// Number of coalesced fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.pending().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{SqliteStore, StoreHandle};
    use crate::types::{Method, NetworkRequest, RequestOptions};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts calls and answers with `{"n": <call number>}`.
    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl NetworkExecutor for CountingExecutor {
        async fn execute(&self, _request: &NetworkRequest) -> ApiResult<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                return Err(ApiError::Remote {
                    message: "upstream down".into(),
                });
            }
            Ok(json!({ "n": n }))
        }
    }

    fn setup(executor: Arc<CountingExecutor>, coalesce: bool) -> (Dispatcher, ManualClock) {
        let clock = ManualClock::new(0);
        let store = SqliteStore::memory().unwrap();
        let cache = ResponseCache::new(StoreHandle::new(Arc::new(store)));
        let dispatcher =
            Dispatcher::with_coalescing(executor, cache, Arc::new(clock.clone()), coalesce);
        (dispatcher, clock)
    }

    fn get(url: &str, minutes: u64) -> ApiRequest {
        ApiRequest::get(url)
            .with_options(RequestOptions::default().with_cache_duration_minutes(minutes))
    }

    #[tokio::test]
    async fn test_ttl_scenario() {
        let exec = Arc::new(CountingExecutor::default());
        let (d, clock) = setup(exec.clone(), false);

        let first = d.execute(get("/users", 1)).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.timestamp, 0);

        clock.set(30_000);
        let second = d.execute(get("/users", 1)).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.timestamp, 0);
        assert_eq!(second.data, first.data);

        clock.set(90_000);
        let third = d.execute(get("/users", 1)).await.unwrap();
        assert!(!third.from_cache);
        assert_eq!(third.timestamp, 90_000);
        assert_eq!(exec.calls.load(Ordering::SeqCst), 2);

        let stored = d.cache().lookup("GET-/users-").await.unwrap().unwrap();
        assert_eq!(stored.timestamp, 90_000);
    }

    #[tokio::test]
    async fn test_use_cache_false_bypasses_cache() {
        let exec = Arc::new(CountingExecutor::default());
        let (d, _clock) = setup(exec.clone(), false);

        let req = ApiRequest::get("/users").with_options(RequestOptions::default().no_cache());
        d.execute(req.clone()).await.unwrap();
        d.execute(req).await.unwrap();

        assert_eq!(exec.calls.load(Ordering::SeqCst), 2);
        assert!(d.cache().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_never_touch_cache() {
        let exec = Arc::new(CountingExecutor::default());
        let (d, _clock) = setup(exec.clone(), false);

        for method in [Method::Post, Method::Put, Method::Delete] {
            let req = ApiRequest::new(method, "/users").with_data(json!({"a": 1}));
            let resp = d.execute(req.clone()).await.unwrap();
            assert!(!resp.from_cache);
            d.execute(req).await.unwrap();
        }

        assert_eq!(exec.calls.load(Ordering::SeqCst), 6);
        assert!(d.cache().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_store_means_no_caching() {
        let exec = Arc::new(CountingExecutor::default());
        let clock = ManualClock::new(0);
        let d = Dispatcher::new(
            exec.clone(),
            ResponseCache::new(StoreHandle::uninitialized()),
            Arc::new(clock),
        );

        assert!(!d.execute(get("/users", 60)).await.unwrap().from_cache);
        assert!(!d.execute(get("/users", 60)).await.unwrap().from_cache);
        assert_eq!(exec.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_network_failure_propagates_and_caches_nothing() {
        let exec = Arc::new(CountingExecutor {
            fail: true,
            ..Default::default()
        });
        let (d, _clock) = setup(exec, false);

        let err = d.execute(get("/users", 60)).await.unwrap_err();
        assert!(matches!(err, ApiError::Remote { ref message } if message == "upstream down"));
        assert!(d.cache().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_coalescing_concurrent_gets_each_fetch() {
        let exec = Arc::new(CountingExecutor {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let (d, _clock) = setup(exec.clone(), false);

        let (a, b) = tokio::join!(d.execute(get("/users", 60)), d.execute(get("/users", 60)));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(exec.calls.load(Ordering::SeqCst), 2);
        assert_eq!(d.cache().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_coalescing_shares_one_fetch() {
        let exec = Arc::new(CountingExecutor {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let (d, _clock) = setup(exec.clone(), true);

        let (a, b, c) = tokio::join!(
            d.execute(get("/users", 60)),
            d.execute(get("/users", 60)),
            d.execute(get("/users", 60)),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(exec.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(d.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_coalescing_shares_errors_too() {
        let exec = Arc::new(CountingExecutor {
            delay: Some(Duration::from_millis(20)),
            fail: true,
            ..Default::default()
        });
        let (d, _clock) = setup(exec.clone(), true);

        let (a, b) = tokio::join!(d.execute(get("/users", 60)), d.execute(get("/users", 60)));
        assert!(a.is_err() && b.is_err());
        assert_eq!(exec.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_coalesced_fetch_survives_dropped_leader() {
        let exec = Arc::new(CountingExecutor {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let (d, _clock) = setup(exec.clone(), true);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), d.execute(get("/users", 60))).await;
        assert!(abandoned.is_err());
        assert_eq!(d.in_flight(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(d.in_flight(), 0);

        let next = d.execute(get("/users", 60)).await.unwrap();
        assert!(next.from_cache);
        assert_eq!(next.data, json!({"n": 1}));
        assert_eq!(exec.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_from_far_past_is_stale() {
        let exec = Arc::new(CountingExecutor::default());
        let (d, clock) = setup(exec.clone(), false);
        clock.set(1_000);

        d.cache()
            .store(&CacheEntry {
                id: "GET-/users-".into(),
                url: "/users".into(),
                method: Method::Get,
                data: json!("ancient"),
                timestamp: i64::MIN,
            })
            .await
            .unwrap();

        let resp = d.execute(get("/users", 60)).await.unwrap();
        assert!(!resp.from_cache);
        assert_eq!(resp.data, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_coalescing_keeps_distinct_keys_apart() {
        let exec = Arc::new(CountingExecutor {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let (d, _clock) = setup(exec.clone(), true);

        let (a, b) = tokio::join!(d.execute(get("/users", 60)), d.execute(get("/groups", 60)));
        assert_ne!(a.unwrap().data, b.unwrap().data);
        assert_eq!(exec.calls.load(Ordering::SeqCst), 2);
    }
}
