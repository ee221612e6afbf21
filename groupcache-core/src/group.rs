//! `spec.md` §3's `Group`: the data model a `get` is served against. Built
//! once through [`crate::registry::Registry`] and never destroyed for the
//! life of the process.

use std::sync::Arc;
use std::time::Duration;

use groupcache_common::prelude::*;

use crate::local::LocalCache;
use crate::picker::PeerPicker;

/// Retry knobs consulted by the orchestrator's replica loop (§4.4, §4.9).
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub back_off: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            back_off: Duration::ZERO,
        }
    }
}

/// One named, independently-configured cache: an origin loader, a peer
/// picker, a local cache tier, an optional validator, stats and retry
/// policy. `name` plus the process's own endpoint is the group's identity
/// (`GroupKey`); two `Group`s with the same name never coexist in one
/// process's registry.
pub struct Group {
    name: String,
    origin: Arc<dyn OriginLoader>,
    picker: Arc<PeerPicker>,
    local_cache: Arc<dyn LocalCache>,
    validator: Arc<dyn Validator>,
    stats: Arc<dyn Stats>,
    retry: RetryConfig,
}

impl Group {
    pub fn new(
        name: impl Into<String>,
        origin: Arc<dyn OriginLoader>,
        picker: Arc<PeerPicker>,
        local_cache: Arc<dyn LocalCache>,
        validator: Arc<dyn Validator>,
        stats: Arc<dyn Stats>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            picker,
            local_cache,
            validator,
            stats,
            retry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &Arc<dyn OriginLoader> {
        &self.origin
    }

    pub fn picker(&self) -> &Arc<PeerPicker> {
        &self.picker
    }

    pub fn local_cache(&self) -> &Arc<dyn LocalCache> {
        &self.local_cache
    }

    pub fn validator(&self) -> &Arc<dyn Validator> {
        &self.validator
    }

    pub fn stats(&self) -> &Arc<dyn Stats> {
        &self.stats
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry
    }

    /// A minimal `Group` for tests that exercise only the registry or the
    /// orchestrator's plumbing, not any particular origin/cache wiring.
    #[cfg(test)]
    pub fn test_stub(name: impl Into<String>) -> Self {
        use crate::picker::ClientFactory;
        use groupcache_memory::memory_cache::{MemoryCache, MemoryCacheConfig};

        struct NoPeers;
        impl ClientFactory for NoPeers {
            fn client_for(&self, _endpoint: &PeerEndpoint) -> Arc<dyn crate::peer_client::PeerClient> {
                unreachable!("test_stub groups have no peers configured")
            }
        }

        async fn never_loads(key: String) -> Result<bytes::Bytes> {
            Err(Error::GroupNotFound(key))
        }

        Self::new(
            name,
            Arc::new(never_loads),
            Arc::new(PeerPicker::new(Arc::new(NoPeers))),
            Arc::new(MemoryCache::new(MemoryCacheConfig::default(), Arc::new(NullStats))),
            Arc::new(NoopValidator),
            Arc::new(NullStats),
            RetryConfig::default(),
        )
    }
}
