//! The facade's ergonomic entry point: wires a [`Group`] together from an
//! origin loader plus whatever local cache tier, validator, stats and retry
//! policy the caller wants, then registers it.

use std::sync::Arc;

use groupcache_common::prelude::*;
use groupcache_core::group::{Group, RetryConfig};
use groupcache_core::local::LocalCache;
use groupcache_core::registry::Registry;
use groupcache_memory::memory_cache::{MemoryCache, MemoryCacheConfig};
use groupcache_storage::disk_cache::{DiskCache, DiskCacheConfig};
use groupcache_transport::pool::PeerPool;

enum CacheChoice {
    Memory(MemoryCacheConfig),
    Disk(DiskCacheConfig),
    Custom(Arc<dyn LocalCache>),
}

pub struct GroupBuilder {
    name: String,
    origin: Arc<dyn OriginLoader>,
    validator: Arc<dyn Validator>,
    stats: Arc<dyn Stats>,
    retry: RetryConfig,
    cache: CacheChoice,
}

impl GroupBuilder {
    /// Defaults: an unbounded-by-count, 64 MiB in-memory cache, no
    /// validator, `NullStats`, and 3 attempts with no back-off — matching
    /// [`MemoryCacheConfig::default`] and [`RetryConfig::default`].
    pub fn new(name: impl Into<String>, origin: Arc<dyn OriginLoader>) -> Self {
        Self {
            name: name.into(),
            origin,
            validator: Arc::new(NoopValidator),
            stats: Arc::new(NullStats),
            retry: RetryConfig::default(),
            cache: CacheChoice::Memory(MemoryCacheConfig::default()),
        }
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn stats(mut self, stats: Arc<dyn Stats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn memory_cache(mut self, config: MemoryCacheConfig) -> Self {
        self.cache = CacheChoice::Memory(config);
        self
    }

    pub fn disk_cache(mut self, config: DiskCacheConfig) -> Self {
        self.cache = CacheChoice::Disk(config);
        self
    }

    pub fn local_cache(mut self, cache: Arc<dyn LocalCache>) -> Self {
        self.cache = CacheChoice::Custom(cache);
        self
    }

    /// Builds the local cache tier (async only because the disk cache's
    /// `new` recreates its root directory), wires the picker from `pool`,
    /// and registers the result — idempotently, so two calls for the same
    /// name on the same pool return the same `Group`.
    pub async fn build(self, pool: &Arc<PeerPool>, registry: &Registry) -> Result<Arc<Group>> {
        let local_cache: Arc<dyn LocalCache> = match self.cache {
            CacheChoice::Memory(config) => Arc::new(MemoryCache::new(config, self.stats.clone())),
            CacheChoice::Disk(config) => Arc::new(DiskCache::<String>::new(config, self.stats.clone()).await?),
            CacheChoice::Custom(cache) => cache,
        };

        let picker = pool.get_picker(&self.name);
        let key = GroupKey::new(self.name.clone(), pool.self_endpoint().clone());
        let name = self.name;
        let origin = self.origin;
        let validator = self.validator;
        let stats = self.stats;
        let retry = self.retry;

        Ok(registry.new_group(key, move || Group::new(name, origin, picker, local_cache, validator, stats, retry)))
    }
}
