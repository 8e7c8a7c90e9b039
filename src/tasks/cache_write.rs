//! Dynamic Cache Write Task
//!
//! Stores a network response in the current generation without delaying
//! delivery of the original response.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{InterceptStats, RequestKey, SharedStorage};
use crate::models::ResponseRecord;

/// Spawns a fire-and-forget write of `response` under `key`.
///
/// Write failures are logged and counted, never returned. Dropping the
/// returned handle detaches the task; awaiting it waits for the write.
///
/// # Example
/// ```ignore
/// let handle = spawn_cache_write(storage.clone(), stats.clone(), "v2".into(), key, clone);
/// // The caller already has the original response.
/// drop(handle);
/// ```
pub fn spawn_cache_write(
    storage: SharedStorage,
    stats: Arc<RwLock<InterceptStats>>,
    cache_name: String,
    key: RequestKey,
    response: ResponseRecord,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = {
            let mut storage_guard = storage.write().await;
            storage_guard.put(&cache_name, key.clone(), response)
        };

        match result {
            Ok(()) => {
                debug!("Cached {} in {}", key.as_str(), cache_name);
                stats.write().await.record_store();
            }
            Err(err) => {
                warn!("Failed to cache {}: {}", key.as_str(), err);
                stats.write().await.record_store_failure();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;
    use url::Url;

    fn key(url: &str) -> RequestKey {
        RequestKey::for_url(&Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_write_stores_response() {
        let storage = CacheStorage::shared(10);
        let stats = Arc::new(RwLock::new(InterceptStats::new()));

        spawn_cache_write(
            storage.clone(),
            stats.clone(),
            "v1".to_string(),
            key("http://h/a.js"),
            ResponseRecord::ok("a"),
        )
        .await
        .unwrap();

        let cached = storage.read().await.match_in("v1", &key("http://h/a.js"));
        assert_eq!(cached.unwrap().body, "a");
        assert_eq!(stats.read().await.stores, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let storage = CacheStorage::shared(0);
        let stats = Arc::new(RwLock::new(InterceptStats::new()));

        let handle = spawn_cache_write(
            storage.clone(),
            stats.clone(),
            "v1".to_string(),
            key("http://h/a.js"),
            ResponseRecord::ok("a"),
        );

        // The task completes normally even though the write failed
        assert!(handle.await.is_ok());
        assert_eq!(stats.read().await.store_failures, 1);
        assert!(storage.read().await.match_in("v1", &key("http://h/a.js")).is_none());
    }
}
