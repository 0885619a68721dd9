//! # TTL Cache Service
//!
//! ```text
//! fetch_with_cache("products", ttl, fetcher)
//!        │
//!        ▼
//!  ┌───────────────┐  hit & fresh   ┌──────────────┐
//!  │ entries[key]  │ ─────────────► │ clone value  │
//!  └──────┬────────┘                └──────────────┘
//!         │ miss / stale
//!         ▼
//!  ┌───────────────┐  Ok(v)   ┌──────────────────────┐
//!  │   fetcher()   │ ───────► │ store (v, now), ret  │
//!  └──────┬────────┘          └──────────────────────┘
//!         │ Err(e)
//!         ▼
//!     propagate, nothing stored
//! ```
//!
//! `clear_cache(["products"])` drops `products` and every `products_*` key,
//! broadcasts a `CLEAR_CACHE` message to the other instances and fires a
//! local [`DataChanged`] event.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::DataResult;
use crate::invalidation::{
    CacheSyncMessage, ChangeSource, DataChanged, InvalidationBus, NoopBus,
};

struct CacheEntry {
    data: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

pub struct CacheService {
    entries: RwLock<HashMap<String, CacheEntry>>,
    origin: Uuid,
    bus: Arc<dyn InvalidationBus>,
    changes: broadcast::Sender<DataChanged>,
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new(Arc::new(NoopBus))
    }
}

impl CacheService {
    pub fn new(bus: Arc<dyn InvalidationBus>) -> Self {
        let (changes, _) = broadcast::channel(64);
        CacheService {
            entries: RwLock::new(HashMap::new()),
            origin: Uuid::new_v4(),
            bus,
            changes,
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Returns the cached value for `key` when younger than `ttl`, otherwise
    /// runs `fetcher` and caches its success.
    pub async fn fetch_with_cache<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> DataResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DataResult<T>>,
    {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.stored_at.elapsed() < ttl {
                    if let Some(value) = entry.data.downcast_ref::<T>() {
                        trace!(key, "Cache hit");
                        return Ok(value.clone());
                    }
                    warn!(key, "Cached value has a different type, refetching");
                }
            }
        }

        trace!(key, "Cache miss");
        let value = fetcher().await?;

        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                data: Arc::new(value.clone()),
                stored_at: Instant::now(),
            },
        );
        Ok(value)
    }

    /// Drops each key and its `key_` family, then tells everyone.
    pub async fn clear_cache(&self, keys: &[&str]) {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let removed = self.remove_matching(&keys).await;
        debug!(?keys, removed, "Cleared cache");

        if let Err(e) = self.bus.publish(&CacheSyncMessage::clear(self.origin, &keys)) {
            warn!(error = %e, "Failed to broadcast cache invalidation");
        }
        self.emit(keys, ChangeSource::Local);
    }

    /// Local-only wipe of every entry.
    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<DataChanged> {
        self.changes.subscribe()
    }

    /// Applies invalidations published by other instances.
    ///
    /// Returns `None` when the bus delivers nothing. The task ends when the
    /// bus closes or the cache is dropped.
    pub fn start_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.bus.subscribe()?;
        let weak: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            loop {
                let received = rx.recv().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };

                match received {
                    Ok(raw) => cache.apply_remote(&raw).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed cache sync messages, invalidating everything");
                        cache.invalidate_all().await;
                        cache.emit(Vec::new(), ChangeSource::Remote);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Cache sync listener stopped");
        }))
    }

    async fn apply_remote(&self, raw: &str) {
        match CacheSyncMessage::from_json(raw) {
            Ok(CacheSyncMessage::ClearCache {
                origin, prefixes, ..
            }) => {
                if origin == self.origin {
                    return;
                }
                let removed = self.remove_matching(&prefixes).await;
                debug!(?prefixes, removed, "Applied remote cache invalidation");
                self.emit(prefixes, ChangeSource::Remote);
            }
            Err(e) => warn!(error = %e, "Ignoring malformed cache sync message"),
        }
    }

    async fn remove_matching(&self, keys: &[String]) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|existing, _| !keys.iter().any(|k| key_matches(existing, k)));
        before - entries.len()
    }

    fn emit(&self, prefixes: Vec<String>, source: ChangeSource) {
        // Nobody listening is fine.
        let _ = self.changes.send(DataChanged { prefixes, source });
    }
}

/// `existing` is `key` itself or `key_…`.
fn key_matches(existing: &str, key: &str) -> bool {
    existing == key
        || existing
            .strip_prefix(key)
            .is_some_and(|rest| rest.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::invalidation::BroadcastBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counted(counter: &AtomicUsize, value: i32) -> DataResult<i32> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[test]
    fn test_key_matching() {
        assert!(key_matches("products", "products"));
        assert!(key_matches("products_{\"active\":true}", "products"));
        assert!(!key_matches("productsx", "products"));
        assert!(!key_matches("permissions_profiles", "permissions"));
        assert!(key_matches("permissions_profiles", "permissions_profiles"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_then_refetch_after() {
        let cache = CacheService::default();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(300);

        let a = cache.fetch_with_cache("k", ttl, || counted(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let b = cache.fetch_with_cache("k", ttl, || counted(&calls, 2)).await.unwrap();
        assert_eq!((a, b), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let c = cache.fetch_with_cache("k", ttl, || counted(&calls, 3)).await.unwrap();
        assert_eq!(c, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = CacheService::default();
        let ttl = Duration::from_secs(60);

        let err = cache
            .fetch_with_cache::<i32, _, _>("k", ttl, || async {
                Err(DataError::Timeout("boom".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(!cache.contains("k").await);

        let calls = AtomicUsize::new(0);
        let v = cache.fetch_with_cache("k", ttl, || counted(&calls, 7)).await.unwrap();
        assert_eq!(v, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_key_and_family_only() {
        let cache = CacheService::default();
        let ttl = Duration::from_secs(60);
        let calls = AtomicUsize::new(0);

        for key in ["products", "products_{\"a\":1}", "productsx", "sales"] {
            cache.fetch_with_cache(key, ttl, || counted(&calls, 0)).await.unwrap();
        }
        let mut changes = cache.subscribe_changes();

        cache.clear_cache(&["products"]).await;

        assert!(!cache.contains("products").await);
        assert!(!cache.contains("products_{\"a\":1}").await);
        assert!(cache.contains("productsx").await);
        assert!(cache.contains("sales").await);

        let event = changes.recv().await.unwrap();
        assert_eq!(event.source, ChangeSource::Local);
        assert_eq!(event.prefixes, vec!["products".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_clear_applies_without_rebroadcast() {
        let bus = BroadcastBus::new("app_cache_sync");
        let a = Arc::new(CacheService::new(Arc::new(bus.clone())));
        let b = Arc::new(CacheService::new(Arc::new(bus.clone())));
        let _la = a.start_listener().unwrap();
        let _lb = b.start_listener().unwrap();

        let ttl = Duration::from_secs(60);
        let calls = AtomicUsize::new(0);
        a.fetch_with_cache("sales", ttl, || counted(&calls, 1)).await.unwrap();
        b.fetch_with_cache("sales_today", ttl, || counted(&calls, 1)).await.unwrap();

        let mut wire = bus.subscribe().unwrap();
        let mut b_changes = b.subscribe_changes();

        a.clear_cache(&["sales"]).await;

        let event = b_changes.recv().await.unwrap();
        assert_eq!(event.source, ChangeSource::Remote);
        assert!(!b.contains("sales_today").await);
        assert!(!a.contains("sales").await);

        // Only the original message travelled.
        wire.recv().await.unwrap();
        tokio::task::yield_now().await;
        assert!(matches!(
            wire.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_own_messages_ignored() {
        let bus = BroadcastBus::new("app_cache_sync");
        let cache = Arc::new(CacheService::new(Arc::new(bus.clone())));
        let _l = cache.start_listener().unwrap();
        let mut changes = cache.subscribe_changes();

        cache.clear_cache(&["users"]).await;
        assert_eq!(changes.recv().await.unwrap().source, ChangeSource::Local);

        tokio::task::yield_now().await;
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_noop_bus_has_no_listener() {
        let cache = Arc::new(CacheService::default());
        assert!(cache.start_listener().is_none());
    }
}
