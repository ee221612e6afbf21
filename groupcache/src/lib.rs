//! groupcache: a distributed, read-through, in-process cache. A fixed set
//! of cooperating peer processes serve reads for string keys identifying
//! immutable payloads; one peer canonically owns each key, concurrent
//! misses coalesce to a single fill, and the owner's answer is cached both
//! in-process and (optionally) on disk.
//!
//! See [`GroupBuilder`] to configure a [`Group`], [`PeerPool`] to bind a
//! process's HTTP peer server and client set, and [`Registry`] to look
//! groups back up by name for inbound dispatch.

pub mod builder;

pub use builder::GroupBuilder;

pub mod prelude {
    pub use crate::GroupBuilder;
    pub use groupcache_common::prelude::*;
    pub use groupcache_core::group::{Group, RetryConfig};
    pub use groupcache_core::orchestrator::{get_async, get_async_locally};
    pub use groupcache_core::registry::Registry;
    pub use groupcache_memory::memory_cache::MemoryCacheConfig;
    pub use groupcache_storage::disk_cache::DiskCacheConfig;
    pub use groupcache_transport::pool::{PeerPool, PeerPoolConfig};
    pub use groupcache_transport::server::serve;
}
