//! Cache maintenance commands.

use anyhow::Context;
use apicache_core::{ApiError, CacheExport, Method};
use serde::Serialize;
use serde_json::json;

use super::super::args::{ClearCacheArgs, FileArgs, GlobalArgs, StatsArgs};
use super::context::{open_session, print_json};

#[derive(Serialize)]
struct ListedEntry {
    id: String,
    url: String,
    method: Method,
    timestamp: i64,
}

pub async fn cmd_clear(global: &GlobalArgs, args: ClearCacheArgs) -> anyhow::Result<()> {
    let session = open_session(global)?;
    session.client.clear_cache(args.url.as_deref()).await?;
    print_json(&json!({ "cleared": true, "url": args.url }))
}

pub async fn cmd_list(global: &GlobalArgs) -> anyhow::Result<()> {
    let session = open_session(global)?;
    let entries = session
        .client
        .cache()
        .list()
        .await
        .map_err(ApiError::from)?;

    let listed: Vec<ListedEntry> = entries
        .into_iter()
        .map(|e| ListedEntry {
            id: e.id,
            url: e.url,
            method: e.method,
            timestamp: e.timestamp,
        })
        .collect();
    print_json(&listed)
}

pub async fn cmd_stats(global: &GlobalArgs, args: StatsArgs) -> anyhow::Result<()> {
    let session = open_session(global)?;
    let client = &session.client;
    let minutes = args
        .ttl_minutes
        .unwrap_or(client.config().cache_duration_minutes);
    let ttl = i64::try_from(minutes.saturating_mul(60_000)).unwrap_or(i64::MAX);

    let stats = client
        .cache()
        .stats(client.now_millis(), ttl)
        .await
        .map_err(ApiError::from)?;
    print_json(&stats)
}

pub async fn cmd_export(global: &GlobalArgs, args: FileArgs) -> anyhow::Result<()> {
    let session = open_session(global)?;
    let client = &session.client;
    let export = client
        .cache()
        .export(client.now_millis())
        .await
        .map_err(ApiError::from)?;

    let content = serde_json::to_string_pretty(&export)?;
    std::fs::write(&args.file, content)
        .with_context(|| format!("failed to write {}", args.file.display()))?;

    print_json(&json!({ "exported": export.entries.len(), "file": args.file }))
}

pub async fn cmd_import(global: &GlobalArgs, args: FileArgs) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let export: CacheExport = serde_json::from_str(&content).map_err(|e| ApiError::InvalidRequest {
        message: format!("{} is not a cache export: {}", args.file.display(), e),
    })?;

    let session = open_session(global)?;
    let imported = session
        .client
        .cache()
        .import(export)
        .await
        .map_err(ApiError::from)?;
    print_json(&json!({ "imported": imported }))
}
