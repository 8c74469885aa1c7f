//! In-process bridge over tokio channels.
//!
//! [`BridgeHost`] is the privileged end: a table of named handlers served by
//! one background task. [`ChannelBridge`] is the caller end. Calls are
//! handled concurrently, so replies to independent calls may arrive in any
//! order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Bridge, FetchRemoteData, FetchRemoteReply, FETCH_REMOTE_DATA};
use crate::error::BridgeError;
use crate::executor::NetworkExecutor;

const DEFAULT_BUFFER: usize = 64;

struct Call {
    operation: String,
    payload: Value,
    reply: oneshot::Sender<Result<Value, BridgeError>>,
}

/// Handler for one named operation on the privileged side.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<Value, BridgeError>;
}

/// Caller end of an in-process bridge.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    tx: mpsc::Sender<Call>,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("operation", &self.operation)
            .finish()
    }
}

#[async_trait]
impl Bridge for ChannelBridge {
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Call {
                operation: operation.to_string(),
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::Closed)?;

        reply_rx.await.map_err(|_| BridgeError::Closed)?
    }
}

/// Privileged end of an in-process bridge.
#[derive(Default)]
pub struct BridgeHost {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl BridgeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an operation name, replacing any previous one.
    pub fn register(mut self, operation: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(operation.into(), handler);
        self
    }

    /// Register the `fetch-remote-data` handler backed by `executor`.
    pub fn with_fetch_remote_data(self, executor: Arc<dyn NetworkExecutor>) -> Self {
        self.register(FETCH_REMOTE_DATA, Arc::new(FetchRemoteDataHandler { executor }))
    }

    pub fn operations(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }

    /// Start serving. The task ends when every [`ChannelBridge`] is dropped.
    pub fn spawn(self) -> (ChannelBridge, JoinHandle<()>) {
        self.spawn_with_buffer(DEFAULT_BUFFER)
    }

    pub fn spawn_with_buffer(self, buffer: usize) -> (ChannelBridge, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Call>(buffer.max(1));
        let handlers = self.handlers;

        let task = tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                let handler = handlers.get(&call.operation).cloned();
                tokio::spawn(async move {
                    let Call {
                        operation,
                        payload,
                        reply,
                    } = call;
                    let result = match handler {
                        Some(h) => h.handle(payload).await,
                        None => {
                            warn!(operation = %operation, "bridge call for unknown operation");
                            Err(BridgeError::UnknownOperation(operation))
                        }
                    };
                    // Caller may have given up; nothing to do then.
                    let _ = reply.send(result);
                });
            }
            debug!("bridge host stopped");
        });

        (ChannelBridge { tx }, task)
    }
}

/// Executes relayed requests with the host's network capability.
struct FetchRemoteDataHandler {
    executor: Arc<dyn NetworkExecutor>,
}

#[async_trait]
impl Handler for FetchRemoteDataHandler {
    async fn handle(&self, payload: Value) -> Result<Value, BridgeError> {
        let request: FetchRemoteData =
            serde_json::from_value(payload).map_err(|e| BridgeError::Codec(e.to_string()))?;
        debug!(method = %request.method, url = %request.url, "relaying remote request");

        let reply = match self.executor.execute(&request).await {
            Ok(data) => FetchRemoteReply::ok(data),
            Err(e) => {
                debug!(url = %request.url, error = %e, "relayed request failed");
                FetchRemoteReply::failed(e.to_string())
            }
        };

        serde_json::to_value(reply).map_err(|e| BridgeError::Codec(e.to_string()))
    }
}
