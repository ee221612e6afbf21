//! C8: the peer picker (`spec.md` §4.8).

use std::collections::HashMap;
use std::sync::Arc;

use groupcache_common::prelude::*;
use groupcache_util::{jump_hash, key_hash};
use parking_lot::RwLock;

use crate::peer_client::PeerClient;

/// Builds the client bound to a given endpoint: the self endpoint resolves
/// to the in-process local handler, any other endpoint to a (typically
/// breaker-wrapped) remote client. Supplied by whoever owns the transport
/// layer, so this crate stays free of any HTTP dependency.
pub trait ClientFactory: Send + Sync + 'static {
    fn client_for(&self, endpoint: &PeerEndpoint) -> Arc<dyn PeerClient>;
}

struct State {
    endpoints: Vec<PeerEndpoint>,
    clients: HashMap<PeerEndpoint, Arc<dyn PeerClient>>,
}

pub struct PeerPicker {
    state: RwLock<State>,
    client_factory: Arc<dyn ClientFactory>,
}

impl PeerPicker {
    pub fn new(client_factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            state: RwLock::new(State {
                endpoints: Vec::new(),
                clients: HashMap::new(),
            }),
            client_factory,
        }
    }

    /// Replaces the endpoint list wholesale.
    pub fn set(&self, endpoints: Vec<PeerEndpoint>) {
        let mut state = self.state.write();
        state.clients.retain(|e, _| endpoints.contains(e));
        state.endpoints = endpoints;
        state.endpoints.sort();
        state.endpoints.dedup();
    }

    /// Unions `endpoints` into the existing list.
    pub fn add(&self, endpoints: Vec<PeerEndpoint>) {
        let mut state = self.state.write();
        for e in endpoints {
            if !state.endpoints.contains(&e) {
                state.endpoints.push(e);
            }
        }
        state.endpoints.sort();
        state.endpoints.dedup();
    }

    pub fn count(&self) -> usize {
        self.state.read().endpoints.len()
    }

    fn client_for(&self, endpoint: &PeerEndpoint) -> Arc<dyn PeerClient> {
        if let Some(client) = self.state.read().clients.get(endpoint) {
            return client.clone();
        }
        let client = self.client_factory.client_for(endpoint);
        self.state.write().clients.insert(endpoint.clone(), client.clone());
        client
    }

    /// `pickPeers(key, n)` (`spec.md` §4.8): deterministic, collision-free
    /// ordered list of up to `n` replica clients, the first being the
    /// canonical owner and the rest ordered fallbacks.
    pub fn pick_peers(&self, key: &str, n: usize) -> Vec<Arc<dyn PeerClient>> {
        let mut buckets = self.state.read().endpoints.clone();
        let hash = key_hash::hash_key(key);
        let mut result = Vec::with_capacity(n.min(buckets.len()));

        for _ in 0..n.min(buckets.len()) {
            let idx = jump_hash::bucket(hash, buckets.len() as i64) as usize;
            let endpoint = buckets.remove(idx);
            result.push(self.client_for(&endpoint));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupcache_common::sink::Sink;
    use tokio_util::sync::CancellationToken;

    struct StubClient(PeerEndpoint);
    #[async_trait::async_trait]
    impl PeerClient for StubClient {
        fn is_local(&self) -> bool {
            false
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
            Ok(())
        }
    }

    struct StubFactory;
    impl ClientFactory for StubFactory {
        fn client_for(&self, endpoint: &PeerEndpoint) -> Arc<dyn PeerClient> {
            Arc::new(StubClient(endpoint.clone()))
        }
    }

    fn picker(n: u16) -> PeerPicker {
        let picker = PeerPicker::new(Arc::new(StubFactory));
        picker.set((0..n).map(|i| PeerEndpoint::new(format!("peer-{i}"), 8080)).collect());
        picker
    }

    #[test]
    fn pick_peers_never_repeats_an_endpoint() {
        let picker = picker(5);
        let clients = picker.pick_peers("some-key", 5);
        assert_eq!(clients.len(), 5);
        let mut endpoints: Vec<_> = clients.iter().map(|c| c.endpoint()).collect();
        endpoints.sort();
        endpoints.dedup();
        assert_eq!(endpoints.len(), 5);
    }

    #[test]
    fn pick_peers_caps_at_peer_count() {
        let picker = picker(2);
        assert_eq!(picker.pick_peers("k", 10).len(), 2);
    }

    #[test]
    fn pick_peers_is_deterministic_for_the_same_key() {
        let picker = picker(8);
        let a: Vec<_> = picker.pick_peers("stable-key", 3).iter().map(|c| c.endpoint()).collect();
        let b: Vec<_> = picker.pick_peers("stable-key", 3).iter().map(|c| c.endpoint()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn set_replaces_and_add_unions() {
        let picker = picker(2);
        picker.add(vec![PeerEndpoint::new("peer-2", 8080)]);
        assert_eq!(picker.count(), 3);
        picker.set(vec![PeerEndpoint::new("peer-9", 8080)]);
        assert_eq!(picker.count(), 1);
    }
}
