//! The local-cache seam a `Group` is configured with: either tier from
//! `spec.md` §4.5/§4.6 behind one shape, so the orchestrator (§4.9) doesn't
//! care which backend a group uses.

use bytes::{Bytes, BytesMut};
use groupcache_common::prelude::*;
use groupcache_memory::memory_cache::{MemoryCache, MemoryCacheEntry};
use groupcache_storage::disk_cache::{DiskCache, DiskCacheEntry};
use tokio_util::sync::CancellationToken;

#[async_trait::async_trait]
pub trait LocalCache: Send + Sync + 'static {
    async fn get_or_add(
        &self,
        key: &str,
        origin: &dyn OriginLoader,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<LocalEntry>;

    fn remove(&self, key: &str);
}

/// The entry handle returned by either backend. An enum rather than a
/// trait object because `DiskCacheEntry::dispose` consumes `self` by value,
/// which doesn't make an object-safe trait method.
pub enum LocalEntry {
    Memory(MemoryCacheEntry),
    Disk(DiskCacheEntry<String>),
}

impl LocalEntry {
    pub async fn value(&self) -> Result<Bytes> {
        match self {
            LocalEntry::Memory(entry) => Ok(entry.value()),
            LocalEntry::Disk(entry) => entry.value().await,
        }
    }

    pub async fn dispose(self) {
        match self {
            LocalEntry::Memory(entry) => entry.dispose().await,
            LocalEntry::Disk(entry) => entry.dispose().await,
        }
    }
}

#[async_trait::async_trait]
impl LocalCache for MemoryCache {
    async fn get_or_add(
        &self,
        key: &str,
        origin: &dyn OriginLoader,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<LocalEntry> {
        MemoryCache::get_or_add(self, key, origin, cache_control, cancel)
            .await
            .map(LocalEntry::Memory)
    }

    fn remove(&self, key: &str) {
        MemoryCache::remove(self, key)
    }
}

#[async_trait::async_trait]
impl LocalCache for DiskCache<String> {
    async fn get_or_add(
        &self,
        key: &str,
        origin: &dyn OriginLoader,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<LocalEntry> {
        let key_owned = key.to_string();
        let key_for_fill = key_owned.clone();
        // The disk cache's `writeAtomic` wants an already-materialized byte
        // buffer, so the origin loader is drained into memory first, the
        // same bridging `MemoryCache` does internally. `fill` only runs on
        // a miss, so `cache_control` is only touched by the origin then.
        let fill = |cc: &mut CacheControl| async move {
            let mut buf = BytesMut::new();
            origin.load_into(&key_for_fill, &mut buf, cc, cancel).await?;
            Ok(buf.freeze())
        };

        DiskCache::get_or_add(self, &key_owned, fill, cache_control, cancel)
            .await
            .map(LocalEntry::Disk)
    }

    fn remove(&self, key: &str) {
        let key = key.to_string();
        // `DiskCache::remove` is async (it deletes the backing file); the
        // `LocalCache` contract keeps `remove` synchronous like
        // `MemoryCache::remove`, so the deletion is fired and forgotten
        // rather than awaited here.
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.remove(&key).await {
                tracing::warn!(%key, %err, "failed to remove disk cache entry");
            }
        });
    }
}
