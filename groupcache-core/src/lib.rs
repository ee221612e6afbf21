//! The orchestration core of groupcache: retry (C4), the peer-client seam
//! and circuit breaker (C7), the peer picker (C8), the local-cache seam
//! (C5/C6 unified), the process-wide group registry (C12), the `Group`
//! data model (§3) and the orchestrator that drives a `get` through all of
//! it (C9).

pub mod breaker;
pub mod group;
pub mod local;
pub mod orchestrator;
pub mod peer_client;
pub mod picker;
pub mod registry;
pub mod retry;

pub mod prelude {
    pub use crate::breaker::CircuitBreaker;
    pub use crate::group::{Group, RetryConfig};
    pub use crate::local::{LocalCache, LocalEntry};
    pub use crate::orchestrator::{get_async, get_async_locally};
    pub use crate::peer_client::PeerClient;
    pub use crate::picker::{ClientFactory, PeerPicker};
    pub use crate::registry::Registry;
    pub use crate::retry::{execute_async, RetryContext};
}
