//! Disk-backed tier of the local cache: the filesystem boundary (C6's
//! `writeAtomic` contract) and the refcounted disk cache itself.

pub mod disk_cache;
pub mod fs;

pub mod prelude {
    pub use crate::disk_cache::{DiskCache, DiskCacheConfig, DiskCacheEntry};
    pub use crate::fs::Filesystem;
}
