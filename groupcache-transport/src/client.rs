//! The remote peer client (`spec.md` §4.11 client side): speaks the wire
//! protocol to another process's [`crate::server`].

use std::time::Duration;

use bytes::Bytes;
use groupcache_common::prelude::*;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use tokio_util::sync::CancellationToken;

use crate::wire;

/// Per-request deadline applied when a caller doesn't override it via
/// [`RemoteClient::with_timeout`] — `spec.md` §5's "outbound HTTP client has
/// a per-request timeout (default 2 minutes)".
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A `PeerClient` backed by a real HTTP connection. Never constructed for
/// the process's own endpoint — see [`crate::pool::PeerPool`].
pub struct RemoteClient {
    endpoint: PeerEndpoint,
    http: HyperClient<HttpConnector, Full<Bytes>>,
    request_timeout: Duration,
}

impl RemoteClient {
    pub fn new(endpoint: PeerEndpoint) -> Self {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: PeerEndpoint, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            http: HyperClient::builder(TokioExecutor::new()).build_http(),
            request_timeout,
        }
    }
}

#[async_trait::async_trait]
impl groupcache_core::peer_client::PeerClient for RemoteClient {
    fn is_local(&self) -> bool {
        false
    }

    fn endpoint(&self) -> PeerEndpoint {
        self.endpoint.clone()
    }

    async fn get(
        &self,
        group_name: &str,
        key: &str,
        sink: &mut dyn Sink,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let body = wire::encode_form(&wire::GetRequest { group_name: group_name.to_string(), key: key.to_string() });
        let uri = format!("http://{}{}", self.endpoint.authority(), wire::PATH);
        let request = http::Request::post(uri)
            .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(body)))
            .map_err(|err| Error::Transport(err.to_string()))?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = tokio::time::timeout(self.request_timeout, self.http.request(request)) => match res {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => return Err(Error::ConnectFailure(err.to_string())),
                Err(_) => return Err(Error::Timeout(self.endpoint.to_string())),
            },
        };

        let status = response.status();
        let no_store = response
            .headers()
            .get(http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("no-store"))
            .unwrap_or(false);

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = tokio::time::timeout(self.request_timeout, response.into_body().collect()) => match res {
                Ok(Ok(collected)) => collected.to_bytes(),
                Ok(Err(err)) => return Err(Error::Transport(err.to_string())),
                Err(_) => return Err(Error::Timeout(self.endpoint.to_string())),
            },
        };

        if status != http::StatusCode::OK {
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(wire::error_for_status(status, text));
        }

        cache_control.no_store = no_store;
        sink.write_all(&body).await
    }
}
