//! Transport bridge between a sandboxed caller and a privileged executor.
//!
//! Every call names an operation and carries one JSON payload; the reply is
//! one JSON value or a [`BridgeError`]. Operation-level failures (the remote
//! request failed) travel inside the reply as `{success: false, error}`,
//! not as a bridge error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;
use crate::types::NetworkRequest;

pub mod channel;

pub use channel::{BridgeHost, ChannelBridge, Handler};

/// Relay a network request to the privileged side.
pub const FETCH_REMOTE_DATA: &str = "fetch-remote-data";

/// Payload of [`FETCH_REMOTE_DATA`].
pub type FetchRemoteData = NetworkRequest;

/// Reply of [`FETCH_REMOTE_DATA`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRemoteReply {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchRemoteReply {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Caller side of the channel.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, BridgeError>;
}
