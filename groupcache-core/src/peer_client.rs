//! The client-side seam crossed by both the in-process local handler and
//! the remote HTTP client (`groupcache-transport`): whatever the picker
//! hands back for a replica, the orchestrator drives it through this one
//! trait.

use groupcache_common::prelude::*;
use tokio_util::sync::CancellationToken;

#[async_trait::async_trait]
pub trait PeerClient: Send + Sync + 'static {
    /// `true` for the client bound to the process's own endpoint — the
    /// orchestrator calls `getAsyncLocally` directly instead of going
    /// through this client's `get` for such replicas.
    fn is_local(&self) -> bool;

    fn endpoint(&self) -> PeerEndpoint;

    async fn get(
        &self,
        group_name: &str,
        key: &str,
        sink: &mut dyn Sink,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
