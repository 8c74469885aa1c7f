//! Explicit cache invalidation.
//!
//! Unlike the dispatcher, faults here reach the caller: a cache that
//! silently failed to clear would keep serving data the caller asked to drop.

use tracing::info;

use crate::cache::ResponseCache;
use crate::error::ApiResult;

#[derive(Debug, Clone)]
pub struct Invalidator {
    cache: ResponseCache,
}

impl Invalidator {
    pub fn new(cache: ResponseCache) -> Self {
        Self { cache }
    }

    /// Remove every entry for `url` (all methods and bodies), or every
    /// entry when `url` is `None`.
    pub async fn invalidate(&self, url: Option<&str>) -> ApiResult<()> {
        match url {
            Some(url) => {
                let removed = self.cache.delete_where(|u| u == url).await?;
                info!(url, removed, "invalidated cached responses");
            }
            None => {
                self.cache.clear_all().await?;
                info!("cleared response cache");
            }
        }
        Ok(())
    }
}
