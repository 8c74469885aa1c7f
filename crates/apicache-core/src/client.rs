//! Public client: `get`, `post`, `put`, `delete`, `clear_cache`.
//!
//! No cache or transport knowledge here. Cache policy lives in the
//! dispatcher, status mapping in the direct executor.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::bridge::Bridge;
use crate::cache::ResponseCache;
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ApiError, ApiResult};
use crate::executor::{executor_for, NetworkExecutor};
use crate::invalidator::Invalidator;
use crate::store::{SqliteStore, StoreHandle};
use crate::types::{ApiRequest, ApiResponse, Method, RequestOptions};

/// Cached remote-data client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    dispatcher: Dispatcher,
    invalidator: Invalidator,
    config: ClientConfig,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Client with a SQLite store at the configured path.
    ///
    /// A sandboxed config needs a bridge; use the builder for that.
    pub fn from_config(config: ClientConfig) -> ApiResult<Self> {
        let path = config.resolved_db_path()?;
        let store = SqliteStore::open(&path)?;
        Self::builder()
            .config(config)
            .store(StoreHandle::new(Arc::new(store)))
            .build()
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::from_config(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Options used when a call passes `None`.
    pub fn default_options(&self) -> RequestOptions {
        RequestOptions {
            use_cache: self.config.use_cache,
            cache_duration_minutes: self.config.cache_duration_minutes,
            ..RequestOptions::default()
        }
    }

    /// The cache adapter, for listing, stats and export/import.
    pub fn cache(&self) -> &ResponseCache {
        self.dispatcher.cache()
    }

    /// The store handle. Initializing it later enables caching.
    pub fn store(&self) -> &StoreHandle {
        self.dispatcher.cache().handle()
    }

    pub fn now_millis(&self) -> i64 {
        self.dispatcher.clock().now_millis()
    }

    /// Dispatch a fully built request.
    pub async fn request(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        self.dispatcher.execute(request).await
    }

    /// GET, served from cache when a fresh entry exists.
    pub async fn get(
        &self,
        url: &str,
        options: impl Into<Option<RequestOptions>>,
    ) -> ApiResult<ApiResponse> {
        let request = ApiRequest::get(url).with_options(self.options(options));
        self.request(request).await
    }

    /// POST. Never cached.
    pub async fn post<T>(
        &self,
        url: &str,
        data: &T,
        options: impl Into<Option<RequestOptions>>,
    ) -> ApiResult<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        self.send_with_body(Method::Post, url, data, options).await
    }

    /// PUT. Never cached.
    pub async fn put<T>(
        &self,
        url: &str,
        data: &T,
        options: impl Into<Option<RequestOptions>>,
    ) -> ApiResult<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        self.send_with_body(Method::Put, url, data, options).await
    }

    /// DELETE. Never cached.
    pub async fn delete(
        &self,
        url: &str,
        options: impl Into<Option<RequestOptions>>,
    ) -> ApiResult<ApiResponse> {
        let request = ApiRequest::new(Method::Delete, url).with_options(self.options(options));
        self.request(request).await
    }

    /// Drop cached responses for `url`, or the whole cache when `None`.
    ///
    /// Store faults are returned, including an uninitialized store.
    pub async fn clear_cache(&self, url: Option<&str>) -> ApiResult<()> {
        self.invalidator.invalidate(url).await
    }

    async fn send_with_body<T>(
        &self,
        method: Method,
        url: &str,
        data: &T,
        options: impl Into<Option<RequestOptions>>,
    ) -> ApiResult<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        let body = encode_body(data)?;
        let request = ApiRequest::new(method, url)
            .with_data(body)
            .with_options(self.options(options));
        self.request(request).await
    }

    fn options(&self, options: impl Into<Option<RequestOptions>>) -> RequestOptions {
        options.into().unwrap_or_else(|| self.default_options())
    }
}

fn encode_body<T: Serialize + ?Sized>(data: &T) -> ApiResult<Value> {
    serde_json::to_value(data).map_err(|e| ApiError::InvalidRequest {
        message: format!("request body is not representable as JSON: {}", e),
    })
}

/// Builder for [`ApiClient`].
///
/// Without an explicit executor, one is chosen from the config's execution
/// context (and the bridge, for a sandboxed context). Without a store, the
/// client starts with an uninitialized handle and caching stays off until
/// it is initialized.
#[derive(Default)]
pub struct ApiClientBuilder {
    config: ClientConfig,
    store: Option<StoreHandle>,
    executor: Option<Arc<dyn NetworkExecutor>>,
    bridge: Option<Arc<dyn Bridge>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: StoreHandle) -> Self {
        self.store = Some(store);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn NetworkExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn bridge(mut self, bridge: Arc<dyn Bridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ApiResult<ApiClient> {
        let executor = match self.executor {
            Some(executor) => executor,
            None => executor_for(&self.config, self.bridge)?,
        };
        let store = self.store.unwrap_or_else(StoreHandle::uninitialized);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = ResponseCache::new(store);

        debug!(
            context = ?self.config.context,
            store = cache.is_available(),
            coalesce = self.config.coalesce_in_flight,
            "building api client"
        );

        Ok(ApiClient {
            dispatcher: Dispatcher::with_coalescing(
                executor,
                cache.clone(),
                clock,
                self.config.coalesce_in_flight,
            ),
            invalidator: Invalidator::new(cache),
            config: self.config,
        })
    }
}
