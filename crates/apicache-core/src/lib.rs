//! Cached remote-data access layer.
//!
//! This crate provides:
//!
//! - A client with `get`/`post`/`put`/`delete` and `clear_cache`
//! - A response cache for GETs, keyed by method, URL and canonical body,
//!   with a per-call freshness window
//! - Execution routing: direct network access in a privileged context, or
//!   relay over a transport bridge from a sandboxed one
//! - An injected persistent store (SQLite by default)
//!
//! # Quick Start
//!
//! ```no_run
//! use apicache_core::{ApiClient, RequestOptions};
//!
//! # async fn example() -> apicache_core::ApiResult<()> {
//! let client = ApiClient::from_env()?;
//!
//! let users = client.get("https://jsonplaceholder.typicode.com/users", None).await?;
//! println!("from cache: {}", users.from_cache);
//!
//! // Shorter freshness window for this call only
//! let opts = RequestOptions::default().with_cache_duration_minutes(5);
//! client.get("https://jsonplaceholder.typicode.com/posts", opts).await?;
//!
//! client.clear_cache(Some("https://jsonplaceholder.typicode.com/users")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Sandboxed context
//!
//! A sandboxed client never touches the network itself. Each request is
//! relayed to a [`BridgeHost`] as a `fetch-remote-data` call:
//!
//! ```no_run
//! use std::sync::Arc;
//! use apicache_core::{
//!     ApiClient, BridgeHost, ClientConfig, DirectExecutor, ExecutionContext,
//! };
//!
//! # async fn example() -> apicache_core::ApiResult<()> {
//! let host_config = ClientConfig::default();
//! let (bridge, _task) = BridgeHost::new()
//!     .with_fetch_remote_data(Arc::new(DirectExecutor::new(&host_config)?))
//!     .spawn();
//!
//! let client = ApiClient::builder()
//!     .config(ClientConfig::default().with_context(ExecutionContext::Sandboxed))
//!     .bridge(Arc::new(bridge))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `APICACHE_BASE_URL` | Base URL for relative request URLs |
//! | `APICACHE_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `APICACHE_MAX_RETRIES` | Retries for idempotent requests (default: 0) |
//! | `APICACHE_USE_CACHE` | Default cache usage (default: true) |
//! | `APICACHE_CACHE_TTL_MINUTES` | Default freshness window (default: 60) |
//! | `APICACHE_COALESCE` | Share one fetch between concurrent identical GETs |
//! | `APICACHE_CONTEXT` | `privileged` (default) or `sandboxed` |
//! | `APICACHE_DB` | SQLite database path |

pub mod bridge;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod invalidator;
pub mod key;
pub mod store;
pub mod types;

// Re-export main types
pub use bridge::{Bridge, BridgeHost, ChannelBridge, FetchRemoteReply, Handler, FETCH_REMOTE_DATA};
pub use cache::{CacheEntry, CacheExport, CacheStats, ResponseCache, EXPORT_VERSION};
pub use client::{ApiClient, ApiClientBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ExecutionContext};
pub use dispatcher::Dispatcher;
pub use error::{ApiError, ApiResult, BridgeError, StoreError, StoreResult};
pub use executor::{executor_for, BridgedExecutor, DirectExecutor, NetworkExecutor};
pub use invalidator::Invalidator;
pub use key::{derive_key, derive_key_json};
pub use store::{SqliteStore, Store, StoreHandle};
pub use types::{
    ApiRequest, ApiResponse, Headers, Method, NetworkRequest, RequestOptions,
    DEFAULT_CACHE_DURATION_MINUTES,
};
