//! Shared vocabulary for the groupcache workspace: the data model types from
//! `spec.md` §3, the error taxonomy from §7, and the external-collaborator
//! capability traits from §6.

pub mod cache_control;
pub mod capability;
pub mod endpoint;
pub mod error;
pub mod sink;
pub mod stats;

pub mod prelude {
    pub use crate::cache_control::CacheControl;
    pub use crate::capability::{NoopValidator, OriginLoader, Validator};
    pub use crate::endpoint::{GroupKey, PeerEndpoint};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::sink::Sink;
    pub use crate::stats::{NullStats, Stats};
    #[cfg(feature = "metrics-stats")]
    pub use crate::stats::MetricsStats;
}
