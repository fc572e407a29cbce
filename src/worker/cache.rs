//! Versioned offline cache bookkeeping.

use std::sync::Arc;

use url::Url;

use crate::platform::web::{CacheStore, Network, WebRequest};
use crate::worker::error::{install_failed, invalid_scope, WorkerResult};

/// Same-origin path of the offline fallback page served to HTML navigations
/// when both network and cache miss. Must be part of the precached assets.
pub const OFFLINE_PAGE_PATH: &str = "/offline.html";

const CACHE_NAME_PREFIX: &str = "hemolink-offline-";

pub fn cache_name(version: &str) -> String {
    format!("{CACHE_NAME_PREFIX}{version}")
}

pub fn resolve_asset(scope: &Url, path: &str) -> WorkerResult<Url> {
    scope
        .join(path)
        .map_err(|err| invalid_scope(format!("cannot resolve asset '{path}': {err}")))
}

/// Fetches every asset and stores it in the named cache. Any failed asset
/// fails the install, matching `cache.addAll` semantics.
pub async fn precache(
    network: &Arc<dyn Network>,
    caches: &Arc<dyn CacheStore>,
    cache: &str,
    scope: &Url,
    assets: &[String],
) -> WorkerResult<()> {
    for asset in assets {
        let url = resolve_asset(scope, asset)?;
        let response = network
            .fetch(&WebRequest::get(url.clone()))
            .await
            .map_err(|err| install_failed(format!("precache of '{asset}' failed: {err}")))?;
        if !response.is_success() {
            return Err(install_failed(format!(
                "precache of '{asset}' returned status {}",
                response.status
            )));
        }
        caches.put(cache, &url, response).await;
    }
    Ok(())
}

/// Deletes every offline cache except the one for the current version tag,
/// keeping deployments from accumulating stale caches.
pub async fn purge_stale(caches: &Arc<dyn CacheStore>, keep: &str) -> u32 {
    let mut purged = 0;
    for name in caches.names().await {
        if name.starts_with(CACHE_NAME_PREFIX) && name != keep {
            if caches.remove(&name).await {
                purged += 1;
            }
        }
    }
    purged
}
