//! External collaborator traits from `spec.md` §6: the origin loader and the
//! (optional) entry validator. Both are supplied by the embedder; this crate
//! only defines the interfaces the core consumes.

use tokio_util::sync::CancellationToken;

use crate::{cache_control::CacheControl, error::Result, sink::Sink};

/// `loadInto(key, sink, cacheControl, cancel) -> completion`.
///
/// Contract (verbatim from `spec.md` §6): the key uniquely identifies its
/// output; the loader writes to `sink` but must not close it; it may set
/// `cache_control.no_store = true` to prevent storage; it may return an
/// error to signal load failure; it must honor cancellation.
#[async_trait::async_trait]
pub trait OriginLoader: Send + Sync + 'static {
    async fn load_into(
        &self,
        key: &str,
        sink: &mut dyn Sink,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

#[async_trait::async_trait]
impl<F, Fut> OriginLoader for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<bytes::Bytes>> + Send + 'static,
{
    async fn load_into(
        &self,
        key: &str,
        sink: &mut dyn Sink,
        _cache_control: &mut CacheControl,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        let bytes = (self)(key.to_string()).await?;
        sink.write_all(&bytes).await
    }
}

/// The optional validator capability: `validateEntryPassThrough(key, sink) ->
/// ValidationStream`, followed by `validateAsync` once the full payload has
/// been written.
///
/// The spec models this as a stream wrapper observed incrementally; because
/// every concrete sink in this crate (memory buffer or disk file) is bounded
/// and fully materialized before being handed to a caller, the orchestrator
/// instead buffers the written bytes and calls [`Validator::validate`] once
/// with the complete payload — an equivalent "pass-through, then validate"
/// sequencing without a separate wrapper type. A validation failure must
/// still cause the key to be removed from the local cache before the error
/// is propagated; that removal lives in `groupcache-core::orchestrator`, not
/// here.
#[async_trait::async_trait]
pub trait Validator: Send + Sync + 'static {
    async fn validate(&self, key: &str, payload: &[u8]) -> Result<()>;
}

/// A validator that accepts everything; used when no validator is
/// configured for a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

#[async_trait::async_trait]
impl Validator for NoopValidator {
    async fn validate(&self, _key: &str, _payload: &[u8]) -> Result<()> {
        Ok(())
    }
}
