//! Client configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::types::DEFAULT_CACHE_DURATION_MINUTES;

/// Which side of the process boundary this client runs on.
///
/// Decided once at startup; the executor is chosen from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Trusted host process with direct network access.
    #[default]
    Privileged,

    /// Untrusted UI process; network I/O is relayed over the bridge.
    Sandboxed,
}

impl FromStr for ExecutionContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "privileged" | "host" => Ok(Self::Privileged),
            "sandboxed" | "sandbox" => Ok(Self::Sandboxed),
            other => Err(format!("unknown execution context: {}", other)),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL relative request URLs are resolved against.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures on idempotent requests.
    #[serde(default)]
    pub max_retries: u32,

    /// Default for `RequestOptions::use_cache`.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,

    /// Default for `RequestOptions::cache_duration_minutes`.
    #[serde(default = "default_cache_duration")]
    pub cache_duration_minutes: u64,

    /// Share one network execution between concurrent identical GETs.
    #[serde(default)]
    pub coalesce_in_flight: bool,

    /// Execution context.
    #[serde(default)]
    pub context: ExecutionContext,

    /// SQLite database path.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    30
}

fn default_use_cache() -> bool {
    true
}

fn default_cache_duration() -> u64 {
    DEFAULT_CACHE_DURATION_MINUTES
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
            max_retries: 0,
            use_cache: default_use_cache(),
            cache_duration_minutes: default_cache_duration(),
            coalesce_in_flight: false,
            context: ExecutionContext::default(),
            db_path: None,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `APICACHE_BASE_URL` | Base URL for relative requests |
    /// | `APICACHE_TIMEOUT` | Request timeout in seconds |
    /// | `APICACHE_MAX_RETRIES` | Retries for idempotent requests |
    /// | `APICACHE_USE_CACHE` | Default cache usage (`1`/`true`/`0`/`false`) |
    /// | `APICACHE_CACHE_TTL_MINUTES` | Default freshness window |
    /// | `APICACHE_COALESCE` | Coalesce concurrent identical GETs |
    /// | `APICACHE_CONTEXT` | `privileged` or `sandboxed` |
    /// | `APICACHE_DB` | SQLite database path |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("APICACHE_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            timeout_secs: std::env::var("APICACHE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            max_retries: std::env::var("APICACHE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            use_cache: std::env::var("APICACHE_USE_CACHE")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or_else(default_use_cache),
            cache_duration_minutes: std::env::var("APICACHE_CACHE_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_cache_duration),
            coalesce_in_flight: std::env::var("APICACHE_COALESCE")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            context: std::env::var("APICACHE_CONTEXT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            db_path: std::env::var("APICACHE_DB").ok().map(PathBuf::from),
        }
    }

    /// Load config from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> ApiResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ApiError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ApiError::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Resolved database path.
    ///
    /// Default: `<platform cache dir>/apicache/cache.sqlite3`
    pub fn resolved_db_path(&self) -> ApiResult<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let base = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| ApiError::Config {
                message: "could not determine cache directory".to_string(),
            })?;
        Ok(base.join("apicache").join("cache.sqlite3"))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_cache_duration_minutes(mut self, minutes: u64) -> Self {
        self.cache_duration_minutes = minutes;
        self
    }

    pub fn with_coalesce_in_flight(mut self, coalesce: bool) -> Self {
        self.coalesce_in_flight = coalesce;
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
