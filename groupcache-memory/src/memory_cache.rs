//! C5: the byte-buffer LRU backing store (`spec.md` §4.5).
//!
//! Wraps [`LruMap`] of [`Bytes`] segments, guarded by [`SingleFlight`] so
//! concurrent misses for the same key run the origin loader once. Entries
//! are plain owned byte buffers: cloning an entry is a cheap refcount bump
//! (`Bytes::clone`), so unlike the disk cache's [`crate::singleflight`]-style
//! refcounted files, `ref()`/`dispose()` are genuine no-ops here — there is
//! no file descriptor or resident resource to release.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use groupcache_common::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::lru::LruMap;
use crate::singleflight::SingleFlight;

#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// `0` disables count-based eviction.
    pub max_entries: usize,
    /// Byte-capacity bound; `0` disables charge-based eviction.
    pub capacity: usize,
    /// `None` disables TTL-based expiry.
    pub ttl: Option<Duration>,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 0,
            capacity: 64 * 1024 * 1024,
            ttl: None,
        }
    }
}

/// A handle to a cached (or freshly loaded, uncached) byte buffer.
///
/// `ref()` and `dispose()` exist to keep the call-site shape identical to
/// the disk cache's entry handle (`spec.md` §9's "async resource scoping"
/// note), even though for in-memory entries both are no-ops.
#[derive(Debug, Clone)]
pub struct MemoryCacheEntry {
    bytes: Bytes,
}

impl MemoryCacheEntry {
    pub fn value(&self) -> Bytes {
        self.bytes.clone()
    }

    /// No-op: see module docs.
    pub fn retain(&self) {}

    /// No-op: see module docs.
    pub async fn dispose(self) {}
}

/// Flight result type shared by all concurrent waiters: the filled bytes
/// plus the cache-control decision the origin loader made while filling.
type FillResult = (Bytes, CacheControl);

pub struct MemoryCache {
    lru: LruMap<String, Bytes>,
    flight: SingleFlight<String, FillResult, Error>,
    stats: Arc<dyn Stats>,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig, stats: Arc<dyn Stats>) -> Self {
        Self {
            lru: LruMap::new(config.max_entries, config.capacity, config.ttl),
            flight: SingleFlight::new(),
            stats,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lru.contains_key(&key.to_string())
    }

    pub fn remove(&self, key: &str) {
        self.lru.remove(&key.to_string());
    }

    pub fn usage(&self) -> usize {
        self.lru.usage()
    }

    /// `getOrAdd(key, factory, cacheControl, cancel) -> entry` (`spec.md`
    /// §4.5). On a miss, `origin` is invoked at most once across all
    /// concurrent callers for `key`; if the resulting `cache_control`
    /// carries `no_store`, the filled buffer is still handed back to every
    /// waiter but none of them retains it in the LRU.
    pub async fn get_or_add(
        &self,
        key: &str,
        origin: &dyn OriginLoader,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<MemoryCacheEntry> {
        let owned_key = key.to_string();

        if let Some(bytes) = self.lru.try_get(&owned_key) {
            self.stats.trace_cache_hits();
            return Ok(MemoryCacheEntry { bytes });
        }

        let (result, was_follower) = self
            .flight
            .do_async_with_role(owned_key.clone(), || Self::fill(origin, &owned_key, cancel))
            .await;
        if was_follower {
            self.stats.trace_loads_deduped();
        }
        let (bytes, filled_cache_control) = result?;
        *cache_control = filled_cache_control;

        if !filled_cache_control.no_store {
            let stats = self.stats.clone();
            self.lru.add(
                owned_key,
                bytes.clone(),
                bytes.len(),
                |_, _| {},
                move |_, _| stats.trace_item_over_capacity(),
            );
        }

        Ok(MemoryCacheEntry { bytes })
    }

    async fn fill(origin: &dyn OriginLoader, key: &str, cancel: &CancellationToken) -> Result<FillResult> {
        let mut cache_control = CacheControl::default();
        let mut buf = BytesMut::new();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = origin.load_into(key, &mut buf, &mut cache_control, cancel) => {
                res?;
                Ok((buf.freeze(), cache_control))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupcache_common::stats::NullStats;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> MemoryCache {
        MemoryCache::new(MemoryCacheConfig::default(), Arc::new(NullStats))
    }

    struct Echo;
    #[async_trait::async_trait]
    impl OriginLoader for Echo {
        async fn load_into(
            &self,
            key: &str,
            sink: &mut dyn Sink,
            _cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            sink.write_all(key.as_bytes()).await
        }
    }

    struct NoStoreOrigin {
        calls: Arc<AtomicUsize>,
    }
    #[async_trait::async_trait]
    impl OriginLoader for NoStoreOrigin {
        async fn load_into(
            &self,
            key: &str,
            sink: &mut dyn Sink,
            cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            cache_control.no_store = true;
            sink.write_all(key.as_bytes()).await
        }
    }

    #[tokio::test]
    async fn local_roundtrip_returns_exact_bytes() {
        let cache = cache();
        let mut cc = CacheControl::default();
        let cancel = CancellationToken::new();
        let entry = cache
            .get_or_add("key1", &Echo, &mut cc, &cancel)
            .await
            .unwrap();
        assert_eq!(entry.value(), Bytes::from_static(b"key1"));
        assert!(!cc.no_store);
        assert!(cache.contains_key("key1"));
    }

    #[tokio::test]
    async fn no_store_propagates_and_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let origin = NoStoreOrigin { calls: calls.clone() };
        let cache = cache();
        let cancel = CancellationToken::new();

        let mut cc = CacheControl::default();
        let entry = cache.get_or_add("key1", &origin, &mut cc, &cancel).await.unwrap();
        assert_eq!(entry.value(), Bytes::from_static(b"key1"));
        assert!(cc.no_store);
        assert!(!cache.contains_key("key1"));

        // A second call invokes the origin again, since nothing was stored.
        let mut cc2 = CacheControl::default();
        cache.get_or_add("key1", &origin, &mut cc2, &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Default)]
    struct CountingStats {
        deduped: AtomicUsize,
    }
    impl Stats for CountingStats {
        fn trace_loads_deduped(&self) {
            self.deduped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SlowEcho;
    #[async_trait::async_trait]
    impl OriginLoader for SlowEcho {
        async fn load_into(
            &self,
            key: &str,
            sink: &mut dyn Sink,
            _cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            sink.write_all(key.as_bytes()).await
        }
    }

    #[tokio::test]
    async fn concurrent_misses_trace_deduped_loads_for_followers_only() {
        let stats = Arc::new(CountingStats::default());
        let cache = Arc::new(MemoryCache::new(MemoryCacheConfig::default(), stats.clone()));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let mut cc = CacheControl::default();
                cache.get_or_add("key1", &SlowEcho, &mut cc, &cancel).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // One leader runs the fill, the other 7 callers coalesce onto it.
        assert_eq!(stats.deduped.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn already_cancelled_token_fails_without_calling_origin() {
        let calls = Arc::new(AtomicUsize::new(0));
        let origin = NoStoreOrigin { calls: calls.clone() };
        let cache = cache();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut cc = CacheControl::default();
        let result = cache.get_or_add("key1", &origin, &mut cc, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn concurrent_misses_dedupe_to_one_origin_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(cache());
        let cancel = CancellationToken::new();

        struct Slow {
            calls: Arc<AtomicUsize>,
        }
        #[async_trait::async_trait]
        impl OriginLoader for Slow {
            async fn load_into(
                &self,
                key: &str,
                sink: &mut dyn Sink,
                _cache_control: &mut CacheControl,
                _cancel: &CancellationToken,
            ) -> Result<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                sink.write_all(key.as_bytes()).await
            }
        }
        let origin = Arc::new(Slow { calls: calls.clone() });

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let origin = origin.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let mut cc = CacheControl::default();
                cache.get_or_add("hot", origin.as_ref(), &mut cc, &cancel).await.unwrap()
            }));
        }
        for h in handles {
            let entry = h.await.unwrap();
            assert_eq!(entry.value(), Bytes::from_static(b"hot"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
