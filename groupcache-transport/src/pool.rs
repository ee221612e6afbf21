//! C10 (client side): lazy, memoized `endpoint -> client` and
//! `groupName -> picker` accessors, mirroring `spec.md` §4.10's description
//! of the pool. The pool itself is the self-endpoint's client (`is_local()
//! == true`); the picker's replica loop never calls `get` on it, it only
//! checks `is_local()` and takes the local-cache path directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use groupcache_common::prelude::*;
use groupcache_core::breaker::CircuitBreaker;
use groupcache_core::peer_client::PeerClient;
use groupcache_core::picker::{ClientFactory, PeerPicker};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::client::{RemoteClient, DEFAULT_REQUEST_TIMEOUT};

#[derive(Debug, Clone, Copy)]
pub struct PeerPoolConfig {
    pub breaker_max_retry: usize,
    pub breaker_back_off: Duration,
    /// Outbound per-request deadline passed to every [`RemoteClient`] the
    /// pool constructs.
    pub request_timeout: Duration,
    /// Concurrent inbound request ceiling enforced by the server's admission
    /// semaphore (`spec.md` §4.10 — "admission semaphore of configurable
    /// concurrent limit, default 24").
    pub admission_limit: usize,
}

impl Default for PeerPoolConfig {
    fn default() -> Self {
        Self {
            breaker_max_retry: 3,
            breaker_back_off: Duration::from_secs(30),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            admission_limit: 24,
        }
    }
}

/// The client bound to this process's own endpoint. `get` is never actually
/// invoked by the orchestrator (it short-circuits on `is_local()`), but it
/// fails loudly rather than silently misbehaving if that ever changes.
struct LocalMarkerClient(PeerEndpoint);

#[async_trait::async_trait]
impl PeerClient for LocalMarkerClient {
    fn is_local(&self) -> bool {
        true
    }

    fn endpoint(&self) -> PeerEndpoint {
        self.0.clone()
    }

    async fn get(
        &self,
        _group_name: &str,
        _key: &str,
        _sink: &mut dyn Sink,
        _cache_control: &mut CacheControl,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(Error::InternalServerError("local marker client's get() was called directly".into()))
    }
}

pub struct PeerPool {
    self_endpoint: PeerEndpoint,
    config: PeerPoolConfig,
    clients: RwLock<HashMap<PeerEndpoint, Arc<dyn PeerClient>>>,
    pickers: RwLock<HashMap<String, Arc<PeerPicker>>>,
    admission: Arc<Semaphore>,
}

impl PeerPool {
    pub fn new(self_endpoint: PeerEndpoint, config: PeerPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            self_endpoint,
            admission: Arc::new(Semaphore::new(config.admission_limit)),
            config,
            clients: RwLock::new(HashMap::new()),
            pickers: RwLock::new(HashMap::new()),
        })
    }

    pub fn self_endpoint(&self) -> &PeerEndpoint {
        &self.self_endpoint
    }

    /// The admission semaphore the server's `handle_get` tries a permit
    /// against — one pool-owned resource, so every caller serving this
    /// pool's endpoint enforces the same concurrent limit.
    pub fn admission(&self) -> Arc<Semaphore> {
        self.admission.clone()
    }

    pub fn admission_limit(&self) -> usize {
        self.config.admission_limit
    }

    pub fn get_client(&self, endpoint: &PeerEndpoint) -> Arc<dyn PeerClient> {
        if let Some(client) = self.clients.read().get(endpoint) {
            return client.clone();
        }
        let client: Arc<dyn PeerClient> = if *endpoint == self.self_endpoint {
            Arc::new(LocalMarkerClient(endpoint.clone()))
        } else {
            Arc::new(CircuitBreaker::new(
                Arc::new(RemoteClient::with_timeout(endpoint.clone(), self.config.request_timeout)),
                self.config.breaker_max_retry,
                self.config.breaker_back_off,
            ))
        };
        self.clients.write().insert(endpoint.clone(), client.clone());
        client
    }

    /// `getPicker(groupName, optional keyHasher)`: the key-hash function
    /// itself isn't pluggable here (`groupcache-util::key_hash` is fixed,
    /// same as the spec's own default), so this only memoizes by name.
    pub fn get_picker(self: &Arc<Self>, group_name: &str) -> Arc<PeerPicker> {
        if let Some(picker) = self.pickers.read().get(group_name) {
            return picker.clone();
        }
        let picker = Arc::new(PeerPicker::new(self.clone() as Arc<dyn ClientFactory>));
        self.pickers.write().insert(group_name.to_string(), picker.clone());
        picker
    }
}

impl ClientFactory for PeerPool {
    fn client_for(&self, endpoint: &PeerEndpoint) -> Arc<dyn PeerClient> {
        self.get_client(endpoint)
    }
}
