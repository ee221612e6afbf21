//! C10/C11 server side: one HTTP server per process bound to its self
//! endpoint, admission-limited, dispatching straight to `getAsyncLocally`
//! (`spec.md` §4.10 — "never the forwarding path, prevents peer-to-peer
//! loops when peer lists disagree").

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use groupcache_common::prelude::*;
use groupcache_core::registry::Registry;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::pool::PeerPool;
use crate::wire;

/// Accepts connections on `listener` until `cancel` fires, dispatching each
/// request through `handle_get`. One spawned task per connection, mirroring
/// `hyper-util`'s own `server::conn::auto` usage pattern. The admission
/// semaphore is `pool`'s own, so every listener serving `pool`'s endpoint
/// shares one concurrent-request ceiling.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>, pool: Arc<PeerPool>, cancel: CancellationToken) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let io = TokioIo::new(stream);
                let registry = registry.clone();
                let pool = pool.clone();
                let conn_cancel = cancel.clone();

                tokio::spawn(async move {
                    let service = hyper::service::service_fn(move |req| {
                        handle(req, registry.clone(), pool.clone(), conn_cancel.clone())
                    });
                    if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        tracing::warn!(%err, "peer connection error");
                    }
                });
            }
        }
    }
}

async fn handle(
    req: http::Request<Incoming>,
    registry: Arc<Registry>,
    pool: Arc<PeerPool>,
    cancel: CancellationToken,
) -> std::result::Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    Ok(handle_get(req, &registry, &pool, &cancel).await)
}

/// `handleGet` (`spec.md` §4.10): acquire an admission permit with a
/// zero-wait try, look the group up in the registry, dispatch to
/// `getAsyncLocally`, release the permit on any exit (by RAII drop of the
/// owned permit at the end of this function).
async fn handle_get(
    req: http::Request<Incoming>,
    registry: &Registry,
    pool: &PeerPool,
    cancel: &CancellationToken,
) -> http::Response<Full<Bytes>> {
    if req.uri().path() != wire::PATH {
        return text_response(http::StatusCode::NOT_FOUND, "no such path");
    }

    let admission = pool.admission();
    let _permit = match admission.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => return text_response(http::StatusCode::SERVICE_UNAVAILABLE, "server busy"),
    };

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return text_response(http::StatusCode::BAD_REQUEST, &err.to_string()),
    };
    let parsed = match wire::decode_form(&body) {
        Ok(parsed) => parsed,
        Err(err) => return text_response(http::StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let key = GroupKey::new(parsed.group_name.clone(), pool.self_endpoint().clone());
    let group = match registry.get_group(&key) {
        Some(group) => group,
        None => {
            return text_response(
                http::StatusCode::NOT_FOUND,
                &format!("group not found: {}", parsed.group_name),
            )
        }
    };

    group.stats().trace_server_requests();
    let in_flight = pool.admission_limit().saturating_sub(admission.available_permits());
    group.stats().trace_concurrent_server_requests(in_flight);

    let mut cache_control = CacheControl::default();
    let mut buf = BytesMut::new();
    match groupcache_core::orchestrator::get_async_locally(&group, &parsed.key, &mut buf, &mut cache_control, cancel).await {
        Ok(()) => {
            let mut builder = http::Response::builder().status(http::StatusCode::OK);
            if cache_control.no_store {
                builder = builder.header(http::header::CACHE_CONTROL, "no-store");
            }
            builder.body(Full::new(buf.freeze())).expect("static response parts are always valid")
        }
        Err(err) => text_response(wire::status_for_error(&err), &err.to_string()),
    }
}

fn text_response(status: http::StatusCode, body: &str) -> http::Response<Full<Bytes>> {
    http::Response::builder()
        .status(status)
        .body(Full::new(Bytes::copy_from_slice(body.as_bytes())))
        .expect("static response parts are always valid")
}
