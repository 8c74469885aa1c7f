//! Client setup shared by every command.

use std::sync::Arc;

use apicache_core::{
    ApiClient, ApiResult, BridgeHost, ClientConfig, DirectExecutor, ExecutionContext,
    SqliteStore, StoreHandle,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use super::super::args::GlobalArgs;

/// A ready client, plus the bridge host task when running sandboxed.
pub struct Session {
    pub client: ApiClient,
    host: Option<JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(host) = &self.host {
            host.abort();
        }
    }
}

/// Config file (or environment), then command-line overrides.
pub fn load_config(global: &GlobalArgs) -> ApiResult<ClientConfig> {
    let mut config = match &global.config {
        Some(path) => ClientConfig::from_yaml_file(path)?,
        None => ClientConfig::from_env(),
    };
    if let Some(db) = &global.db {
        config = config.with_db_path(db);
    }
    if let Some(url) = &global.base_url {
        config = config.with_base_url(url.clone());
    }
    if global.sandboxed {
        config = config.with_context(ExecutionContext::Sandboxed);
    }
    Ok(config)
}

pub fn open_session(global: &GlobalArgs) -> ApiResult<Session> {
    let config = load_config(global)?;
    let path = config.resolved_db_path()?;
    debug!(db = %path.display(), context = ?config.context, "opening cache");

    let store = StoreHandle::new(Arc::new(SqliteStore::open(&path)?));
    let mut builder = ApiClient::builder().store(store);
    let mut host = None;

    if config.context == ExecutionContext::Sandboxed {
        let host_config = config.clone().with_context(ExecutionContext::Privileged);
        let executor = DirectExecutor::new(&host_config)?;
        let (bridge, task) = BridgeHost::new()
            .with_fetch_remote_data(Arc::new(executor))
            .spawn();
        builder = builder.bridge(Arc::new(bridge));
        host = Some(task);
    }

    Ok(Session {
        client: builder.config(config).build()?,
        host,
    })
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
