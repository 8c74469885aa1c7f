//! Error types for the access layer.
//!
//! Three concerns, three enums:
//!
//! - [`ApiError`] is what callers of the public operations see.
//! - [`StoreError`] comes from the persistent store and the cache adapter.
//! - [`BridgeError`] comes from the transport bridge itself (not from the
//!   remote call it relays).

use std::time::Duration;

/// Errors surfaced by `get`/`post`/`put`/`delete` and `clear_cache`.
///
/// `Clone` so that coalesced waiters can share a single outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Connection, timeout or body-read failure in the direct executor.
    #[error("network error: {message}")]
    Network { message: String },

    /// The remote answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The privileged side reported `success: false`.
    #[error("remote request failed: {message}")]
    Remote { message: String },

    /// The bridge could not deliver the call or its reply.
    #[error("bridge error: {message}")]
    Bridge { message: String },

    /// Rate limited by the remote.
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The reply could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// The request can never be sent (bad URL, unencodable body).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Store failure on an explicitly requested operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ApiError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Caller mistakes
            Self::InvalidRequest { .. } => 1,
            Self::Config { .. } => 1,

            // Remote said no
            Self::Http { .. } => 3,
            Self::Remote { .. } => 3,

            // Network/transient
            Self::Network { .. } => 5,
            Self::RateLimited { .. } => 5,
            Self::Bridge { .. } => 5,

            // Other
            Self::InvalidResponse { .. } => 6,
            Self::Store(_) => 7,
        }
    }

    /// Whether the error is worth retrying for an idempotent request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the failure happened on the way to or from the remote.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Http { .. }
                | Self::Remote { .. }
                | Self::Bridge { .. }
                | Self::RateLimited { .. }
                | Self::InvalidResponse { .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self::Bridge {
            message: err.to_string(),
        }
    }
}

/// Persistent store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store handle has not been initialized.
    #[error("store unavailable: not initialized")]
    Unavailable,

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("unknown index {index} on collection {collection}")]
    UnknownIndex { collection: String, index: String },

    /// Record has no string key at the collection's key path.
    #[error("invalid record for {collection}: {reason}")]
    InvalidRecord { collection: String, reason: String },

    /// A stored record does not decode into the expected shape.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A multi-record operation was rolled back.
    #[error("transaction over {attempted} records rolled back: {message}")]
    Transaction { attempted: usize, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Transport bridge errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The other side of the channel is gone.
    #[error("bridge channel closed")]
    Closed,

    /// A handler failed before it could produce a reply.
    #[error("handler for {operation} failed: {message}")]
    Handler { operation: String, message: String },

    #[error("payload codec error: {0}")]
    Codec(String),
}

/// Result type for public operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
