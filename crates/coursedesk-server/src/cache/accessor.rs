//! Cache-aside reads over the key-value store.
//!
//! Reads try the cache first and fall back to the loader on a miss. The cache
//! is never authoritative: read errors and undecodable payloads count as
//! misses, write errors are logged and ignored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use coursedesk_storage::KeyValueStore;

use super::keys::CacheKey;
use crate::config::CacheConfig;
use crate::metrics;

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    list_ttl: Duration,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.ttl(),
            list_ttl: config.list_ttl(),
        }
    }

    /// TTL for per-id entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// TTL for collection entries.
    pub fn list_ttl(&self) -> Duration {
        self.list_ttl
    }

    /// Returns the cached value for `key`, or runs `load` and caches its result.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }

        let value = load().await?;
        self.store_value(key, &value, ttl).await;
        Ok(value)
    }

    /// Like [`get_or_load`](Self::get_or_load) for loaders that may find nothing.
    /// `None` is returned as-is and never cached.
    pub async fn get_or_load_optional<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(Some(hit));
        }

        let value = load().await?;
        if let Some(ref found) = value {
            self.store_value(key, found, ttl).await;
        }
        Ok(value)
    }

    /// Drops the entry for `key`. Failures are logged only.
    pub async fn invalidate(&self, key: &CacheKey) {
        match self.store.delete(key.as_str()).await {
            Ok(()) => {
                metrics::record_cache_invalidation(key.family());
                tracing::debug!(key = %key, "cache invalidated");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache invalidation failed");
            }
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = match self.store.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_miss(key.family());
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed");
                metrics::record_cache_miss(key.family());
                return None;
            }
        };

        match rmp_serde::from_slice(&bytes) {
            Ok(value) => {
                tracing::debug!(key = %key, "cache hit");
                metrics::record_cache_hit(key.family());
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "undecodable cache entry, dropping");
                metrics::record_cache_miss(key.family());
                if let Err(e) = self.store.delete(key.as_str()).await {
                    tracing::warn!(key = %key, error = %e, "failed to drop cache entry");
                }
                None
            }
        }
    }

    async fn store_value<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let bytes = match rmp_serde::to_vec_named(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key.as_str(), &bytes, ttl).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use coursedesk_db_memory::InMemoryKeyValueStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        name: String,
    }

    fn setup() -> (Arc<InMemoryKeyValueStore>, CacheAside) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let cache = CacheAside::new(store.clone(), &CacheConfig::default());
        (store, cache)
    }

    fn item(name: &str) -> Item {
        Item {
            id: 1,
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (_store, cache) = setup();
        let key = CacheKey::assignment(1);
        let loads = AtomicUsize::new(0);
        let counter = &loads;

        for _ in 0..3 {
            let value: Result<Item, ()> = cache
                .get_or_load(&key, cache.ttl(), move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(item("first"))
                })
                .await;
            assert_eq!(value.unwrap(), item("first"));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_each_load_and_leave_a_valid_entry() {
        let (store, cache) = setup();
        let key = CacheKey::assignment(1);
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let key = key.clone();
                let loads = loads.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_load(&key, cache.ttl(), || async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<_, ()>(item("db"))
                        })
                        .await
                })
            })
            .collect();

        for result in futures_util::future::join_all(tasks).await {
            assert_eq!(result.unwrap(), Ok(item("db")));
        }
        assert!(loads.load(Ordering::SeqCst) >= 1);

        let cached = store.get(key.as_str()).await.unwrap().unwrap();
        let decoded: Item = rmp_serde::from_slice(&cached).unwrap();
        assert_eq!(decoded, item("db"));
    }

    #[tokio::test]
    async fn loader_errors_are_returned_and_not_cached() {
        let (store, cache) = setup();
        let key = CacheKey::assignment(1);

        let result: Result<Item, &str> = cache
            .get_or_load(&key, cache.ttl(), || async { Err("db down") })
            .await;
        assert_eq!(result.unwrap_err(), "db down");
        assert!(!store.exists(key.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn absent_results_are_not_cached() {
        let (store, cache) = setup();
        let key = CacheKey::assignment(9);

        let result: Result<Option<Item>, ()> = cache
            .get_or_load_optional(&key, cache.ttl(), || async { Ok(None) })
            .await;
        assert_eq!(result.unwrap(), None);
        assert!(!store.exists(key.as_str()).await.unwrap());

        let result: Result<Option<Item>, ()> = cache
            .get_or_load_optional(&key, cache.ttl(), || async { Ok(Some(item("late"))) })
            .await;
        assert_eq!(result.unwrap(), Some(item("late")));
        assert!(store.exists(key.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn invalidation_forces_a_reload() {
        let (store, cache) = setup();
        let key = CacheKey::assignment(1);

        let _: Result<Item, ()> = cache
            .get_or_load(&key, cache.ttl(), || async { Ok(item("old")) })
            .await;
        cache.invalidate(&key).await;
        assert!(!store.exists(key.as_str()).await.unwrap());

        let fresh: Result<Item, ()> = cache
            .get_or_load(&key, cache.ttl(), || async { Ok(item("new")) })
            .await;
        assert_eq!(fresh.unwrap().name, "new");
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let (_store, cache) = setup();
        let key = CacheKey::assignment(1);
        let ttl = Duration::from_millis(40);

        let _: Result<Item, ()> = cache
            .get_or_load(&key, ttl, || async { Ok(item("old")) })
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let value: Result<Item, ()> = cache
            .get_or_load(&key, ttl, || async { Ok(item("new")) })
            .await;
        assert_eq!(value.unwrap().name, "new");
    }

    #[tokio::test]
    async fn undecodable_entries_are_dropped_and_reloaded() {
        let (store, cache) = setup();
        let key = CacheKey::assignment(1);
        store
            .set(key.as_str(), b"\xc1 not msgpack", Duration::from_secs(60))
            .await
            .unwrap();

        let value: Result<Item, ()> = cache
            .get_or_load(&key, cache.ttl(), || async { Ok(item("db")) })
            .await;
        assert_eq!(value.unwrap().name, "db");

        let cached = store.get(key.as_str()).await.unwrap().unwrap();
        let decoded: Item = rmp_serde::from_slice(&cached).unwrap();
        assert_eq!(decoded.name, "db");
    }

    #[tokio::test]
    async fn unavailable_store_falls_through_to_loader() {
        let (store, cache) = setup();
        store.set_connected(false);
        let key = CacheKey::assignment(1);

        let value: Result<Item, ()> = cache
            .get_or_load(&key, cache.ttl(), || async { Ok(item("db")) })
            .await;
        assert_eq!(value.unwrap().name, "db");

        // invalidation failures are swallowed
        cache.invalidate(&key).await;
    }
}
