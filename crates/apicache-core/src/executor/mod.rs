//! Network executors.
//!
//! One interface, two capabilities: [`DirectExecutor`] talks to the network
//! itself, [`BridgedExecutor`] relays through a [`Bridge`] to a process that
//! can. Which one a client gets is decided once, from its
//! [`ExecutionContext`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bridge::Bridge;
use crate::config::{ClientConfig, ExecutionContext};
use crate::error::{ApiError, ApiResult};
use crate::types::NetworkRequest;

mod bridged;
mod direct;

pub use bridged::BridgedExecutor;
pub use direct::{DirectExecutor, USER_AGENT_VALUE};

/// Performs one network call and returns the decoded response body.
#[async_trait]
pub trait NetworkExecutor: Send + Sync {
    async fn execute(&self, request: &NetworkRequest) -> ApiResult<Value>;
}

/// Pick the executor for a context.
///
/// A sandboxed context needs a bridge; a privileged one ignores it.
pub fn executor_for(
    config: &ClientConfig,
    bridge: Option<Arc<dyn Bridge>>,
) -> ApiResult<Arc<dyn NetworkExecutor>> {
    match config.context {
        ExecutionContext::Privileged => Ok(Arc::new(DirectExecutor::new(config)?)),
        ExecutionContext::Sandboxed => {
            let bridge = bridge.ok_or_else(|| ApiError::Config {
                message: "sandboxed context requires a transport bridge".to_string(),
            })?;
            Ok(Arc::new(BridgedExecutor::new(bridge)))
        }
    }
}
