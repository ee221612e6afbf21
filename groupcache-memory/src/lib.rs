//! In-process memory layer for groupcache: the ordered LRU map (C2), the
//! single-flight coalescing gate (C3) and the memory cache that combines
//! them (C5).

pub mod lru;
pub mod memory_cache;
pub mod singleflight;

pub mod prelude {
    pub use crate::lru::LruMap;
    pub use crate::memory_cache::{MemoryCache, MemoryCacheConfig, MemoryCacheEntry};
    pub use crate::singleflight::SingleFlight;
}
