//! C9: the group orchestrator (`spec.md` §4.9) — the control core a `get`
//! actually runs through.
//!
//! Three distinct load paths, per the spec's own distinctions:
//! - `local_load`: bare read from this process's local cache tier (calling
//!   the origin loader on a miss), no validation. Used by the replica loop
//!   when the picked replica is self.
//! - `get_async_locally`: `local_load` plus validation, with a failed
//!   validation evicting the key before the error propagates. This is what
//!   the HTTP server (§4.10) dispatches an inbound request to.
//! - peer-load (inlined in `load_via_replicas`): calls the remote client,
//!   then validates the bytes it returned, same as `get_async_locally` does
//!   for local ones.
//!
//! `get_async` is the client-facing entry point: pick replicas, try the
//! owner first and fall back across the picker's ordered list, and if every
//! attempt is exhausted or a non-whitelisted error escapes, fall through to
//! a final direct local load rather than failing the caller outright.

use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use groupcache_common::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::group::Group;
use crate::retry;

/// Loads `key` for `group`, preferring the owning replica and falling back
/// across the picker's ordered list; on total exhaustion, falls through to
/// a direct local load (origin included) rather than propagating the last
/// replica error.
pub async fn get_async(
    group: &Group,
    key: &str,
    sink: &mut dyn Sink,
    cache_control: &mut CacheControl,
    cancel: &CancellationToken,
) -> Result<()> {
    group.stats().trace_gets();
    let started = Instant::now();

    let replicas = group.picker().pick_peers(key, group.picker().count());

    let bytes = if replicas.is_empty() {
        let mut buf = BytesMut::new();
        local_load(group, key, &mut buf, cache_control, cancel).await?;
        buf.freeze()
    } else {
        match load_via_replicas(group, &replicas, key, cache_control, cancel).await {
            Ok(bytes) => bytes,
            Err(_) => {
                // Every replica attempt is exhausted, or a non-whitelisted
                // error escaped: fall through to a direct local load rather
                // than failing the caller just because the owner happened
                // to be unreachable.
                let mut buf = BytesMut::new();
                local_load(group, key, &mut buf, cache_control, cancel).await?;
                buf.freeze()
            }
        }
    };

    sink.write_all(&bytes).await?;
    group.stats().trace_roundtrip_latency(started.elapsed());
    Ok(())
}

async fn load_via_replicas(
    group: &Group,
    replicas: &[Arc<dyn crate::peer_client::PeerClient>],
    key: &str,
    cache_control: &mut CacheControl,
    cancel: &CancellationToken,
) -> Result<bytes::Bytes> {
    let attempts = group.retry().max_attempts.min(replicas.len());
    let name = group.name().to_string();

    retry::execute_async(
        attempts,
        group.retry().back_off,
        |err| err.is_retryable_across_replicas(),
        |ctx| {
            let replica = replicas[ctx.attempt_count].clone();
            let name = name.clone();
            let cache_control = &mut *cache_control;
            async move {
                if ctx.attempt_count > 0 {
                    group.stats().trace_retry();
                }
                if replica.is_local() {
                    let mut buf = BytesMut::new();
                    local_load(group, key, &mut buf, cache_control, cancel).await?;
                    return Ok(buf.freeze());
                }

                group.stats().trace_peer_loads();
                let mut buf = BytesMut::new();
                if let Err(err) = replica.get(&name, key, &mut buf, cache_control, cancel).await {
                    if err.kind() != ErrorKind::BreakerOpen {
                        tracing::warn!(peer = %replica.endpoint(), %err, "peer load failed");
                    }
                    return Err(err);
                }
                let bytes = buf.freeze();
                group.validator().validate(key, &bytes).await?;
                Ok(bytes)
            }
        },
    )
    .await
}

/// Bare read from this process's own local cache tier: the tier's
/// `getOrAdd` (which calls the origin loader at most once per key across
/// concurrent callers on a miss), streamed to `sink`, entry always disposed
/// afterward. No validation — see module docs for why that's `get_async_locally`'s
/// job, not this one's.
async fn local_load(
    group: &Group,
    key: &str,
    sink: &mut dyn Sink,
    cache_control: &mut CacheControl,
    cancel: &CancellationToken,
) -> Result<()> {
    group.stats().trace_local_loads();
    let entry = group
        .local_cache()
        .get_or_add(key, group.origin().as_ref(), cache_control, cancel)
        .await?;

    let result = async {
        let bytes = entry.value().await?;
        sink.write_all(&bytes).await
    }
    .await;
    entry.dispose().await;
    result
}

/// `local_load` plus validation of the complete payload. A validation
/// failure evicts the key from the local cache before the error is
/// propagated, per `spec.md` §6's validator contract. This is the entry
/// point the HTTP server (§4.10) dispatches an inbound request to.
pub async fn get_async_locally(
    group: &Group,
    key: &str,
    sink: &mut dyn Sink,
    cache_control: &mut CacheControl,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut buf = BytesMut::new();
    local_load(group, key, &mut buf, cache_control, cancel).await?;
    let bytes = buf.freeze();

    if let Err(err) = group.validator().validate(key, &bytes).await {
        group.local_cache().remove(key);
        return Err(err);
    }

    sink.write_all(&bytes).await
}
