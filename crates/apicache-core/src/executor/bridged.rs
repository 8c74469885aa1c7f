//! Network execution relayed through the transport bridge.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::NetworkExecutor;
use crate::bridge::{Bridge, FetchRemoteReply, FETCH_REMOTE_DATA};
use crate::error::{ApiError, ApiResult};
use crate::types::NetworkRequest;

/// Executor for contexts without network capability.
#[derive(Clone)]
pub struct BridgedExecutor {
    bridge: Arc<dyn Bridge>,
}

impl BridgedExecutor {
    pub fn new(bridge: Arc<dyn Bridge>) -> Self {
        Self { bridge }
    }
}

impl std::fmt::Debug for BridgedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgedExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl NetworkExecutor for BridgedExecutor {
    async fn execute(&self, request: &NetworkRequest) -> ApiResult<Value> {
        debug!(method = %request.method, url = %request.url, "relaying request over bridge");

        let payload = serde_json::to_value(request).map_err(|e| ApiError::InvalidRequest {
            message: format!("failed to encode bridge payload: {}", e),
        })?;
        let raw = self.bridge.invoke(FETCH_REMOTE_DATA, payload).await?;

        let reply: FetchRemoteReply =
            serde_json::from_value(raw).map_err(|e| ApiError::InvalidResponse {
                message: format!("failed to parse bridge reply: {}", e),
            })?;

        if reply.success {
            Ok(reply.data.unwrap_or(Value::Null))
        } else {
            Err(ApiError::Remote {
                message: reply
                    .error
                    .unwrap_or_else(|| "remote request failed".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records payloads and answers with a canned reply.
    struct CannedBridge {
        reply: Result<Value, BridgeError>,
        seen: Mutex<Vec<(String, Value)>>,
    }

    impl CannedBridge {
        fn new(reply: Result<Value, BridgeError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Bridge for CannedBridge {
        async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, BridgeError> {
            self.seen
                .lock()
                .unwrap()
                .push((operation.to_string(), payload));
            self.reply.clone()
        }
    }

    fn request() -> NetworkRequest {
        NetworkRequest {
            url: "https://api.test/users".into(),
            method: crate::types::Method::Post,
            data: Some(json!({"name": "ada"})),
            headers: [("x-trace".to_string(), "1".to_string())].into(),
        }
    }

    #[tokio::test]
    async fn test_payload_matches_wire_format() {
        let bridge = CannedBridge::new(Ok(json!({"success": true, "data": {"id": 1}})));
        let exec = BridgedExecutor::new(bridge.clone());

        let data = exec.execute(&request()).await.unwrap();
        assert_eq!(data, json!({"id": 1}));

        let seen = bridge.seen.lock().unwrap();
        assert_eq!(seen[0].0, "fetch-remote-data");
        assert_eq!(
            seen[0].1,
            json!({
                "url": "https://api.test/users",
                "method": "POST",
                "data": {"name": "ada"},
                "headers": {"x-trace": "1"}
            })
        );
    }

    #[tokio::test]
    async fn test_failed_reply_carries_message() {
        let bridge = CannedBridge::new(Ok(
            json!({"success": false, "error": "Request failed with status code 404"}),
        ));
        let exec = BridgedExecutor::new(bridge);

        match exec.execute(&request()).await {
            Err(ApiError::Remote { message }) => {
                assert_eq!(message, "Request failed with status code 404")
            }
            other => panic!("expected Remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bridge_failure_is_bridge_error() {
        let exec = BridgedExecutor::new(CannedBridge::new(Err(BridgeError::Closed)));
        assert!(matches!(
            exec.execute(&request()).await,
            Err(ApiError::Bridge { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_invalid_response() {
        let exec = BridgedExecutor::new(CannedBridge::new(Ok(json!("ok"))));
        assert!(matches!(
            exec.execute(&request()).await,
            Err(ApiError::InvalidResponse { .. })
        ));
    }
}
