//! The six end-to-end scenarios from `spec.md` §8, run against real
//! `tokio` tasks and (for 4-6) real loopback HTTP servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use groupcache::prelude::*;
use groupcache_transport::server;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct Echo;
#[async_trait::async_trait]
impl OriginLoader for Echo {
    async fn load_into(
        &self,
        key: &str,
        sink: &mut dyn Sink,
        _cache_control: &mut CacheControl,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        sink.write_all(key.as_bytes()).await
    }
}

#[tokio::test]
async fn scenario_1_local_roundtrip() {
    let pool = PeerPool::new(PeerEndpoint::new("127.0.0.1", 0), PeerPoolConfig::default());
    let registry = Registry::new();

    struct HelloWorld;
    #[async_trait::async_trait]
    impl OriginLoader for HelloWorld {
        async fn load_into(
            &self,
            _key: &str,
            sink: &mut dyn Sink,
            _cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            sink.write_all(b"HelloWorld").await
        }
    }

    let group = GroupBuilder::new("g", Arc::new(HelloWorld)).build(&pool, &registry).await.unwrap();

    let mut cc = CacheControl::default();
    let mut sink = Vec::new();
    let cancel = CancellationToken::new();
    get_async(&group, "key1", &mut sink, &mut cc, &cancel).await.unwrap();

    assert_eq!(sink, b"HelloWorld");
    assert!(!cc.no_store);
}

#[tokio::test]
async fn scenario_2_no_store_propagation() {
    let pool = PeerPool::new(PeerEndpoint::new("127.0.0.1", 0), PeerPoolConfig::default());
    let registry = Registry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    struct Uncacheable(Arc<AtomicUsize>);
    #[async_trait::async_trait]
    impl OriginLoader for Uncacheable {
        async fn load_into(
            &self,
            _key: &str,
            sink: &mut dyn Sink,
            cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            cache_control.no_store = true;
            sink.write_all(b"HelloWorld").await
        }
    }

    let group = GroupBuilder::new("g2", Arc::new(Uncacheable(calls.clone()))).build(&pool, &registry).await.unwrap();

    let mut cc = CacheControl::default();
    let mut sink = Vec::new();
    let cancel = CancellationToken::new();
    get_async(&group, "key1", &mut sink, &mut cc, &cancel).await.unwrap();
    assert_eq!(sink, b"HelloWorld");
    assert!(cc.no_store);

    let mut cc = CacheControl::default();
    let mut sink = Vec::new();
    get_async(&group, "key1", &mut sink, &mut cc, &cancel).await.unwrap();
    assert_eq!(sink, b"HelloWorld");

    assert_eq!(calls.load(Ordering::SeqCst), 2, "an uncacheable entry must re-invoke the origin every call");
}

#[tokio::test]
async fn scenario_3_cancellation() {
    let pool = PeerPool::new(PeerEndpoint::new("127.0.0.1", 0), PeerPoolConfig::default());
    let registry = Registry::new();
    let group = GroupBuilder::new("g3", Arc::new(Echo)).build(&pool, &registry).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut cc = CacheControl::default();
    let mut sink = Vec::new();

    let err = get_async(&group, "key1", &mut sink, &mut cc, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(sink.is_empty());
}

/// A node standing up a real HTTP peer server on a loopback port, for
/// scenarios 4-6.
struct Node {
    pool: Arc<PeerPool>,
    registry: Arc<Registry>,
    endpoint: PeerEndpoint,
    cancel: CancellationToken,
}

async fn spawn_node() -> Node {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = PeerEndpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
    let pool = PeerPool::new(endpoint.clone(), PeerPoolConfig::default());
    let registry = Arc::new(Registry::new());
    let cancel = CancellationToken::new();
    tokio::spawn(server::serve(listener, registry.clone(), pool.clone(), cancel.clone()));
    Node { pool, registry, endpoint, cancel }
}

#[tokio::test]
async fn scenario_4_peer_forwarding() {
    let p1 = spawn_node().await;
    let p2 = spawn_node().await;
    let peers = vec![p1.endpoint.clone(), p2.endpoint.clone()];

    struct CountingEcho(Arc<AtomicUsize>);
    #[async_trait::async_trait]
    impl OriginLoader for CountingEcho {
        async fn load_into(
            &self,
            key: &str,
            sink: &mut dyn Sink,
            _cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            sink.write_all(key.as_bytes()).await
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let origin: Arc<dyn OriginLoader> = Arc::new(CountingEcho(calls.clone()));

    let group1 = GroupBuilder::new("TestGroupForwarding", origin.clone())
        .build(&p1.pool, &p1.registry)
        .await
        .unwrap();
    let group2 = GroupBuilder::new("TestGroupForwarding", origin)
        .build(&p2.pool, &p2.registry)
        .await
        .unwrap();
    p1.pool.get_picker("TestGroupForwarding").set(peers.clone());
    p2.pool.get_picker("TestGroupForwarding").set(peers);

    let cancel = CancellationToken::new();
    for key in ["foo", "bar"] {
        for _ in 0..2 {
            for group in [&group1, &group2] {
                let mut cc = CacheControl::default();
                let mut sink = Vec::new();
                get_async(group, key, &mut sink, &mut cc, &cancel).await.unwrap();
                assert_eq!(sink, key.as_bytes());
            }
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2, "one origin call per distinct key, regardless of which peer served it");

    p1.cancel.cancel();
    p2.cancel.cancel();
}

#[tokio::test]
async fn scenario_5_recursive_fibonacci() {
    let p1 = spawn_node().await;
    let p2 = spawn_node().await;
    let peers = vec![p1.endpoint.clone(), p2.endpoint.clone()];

    struct FibOrigin {
        group: Arc<OnceLock<Weak<Group>>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl OriginLoader for FibOrigin {
        async fn load_into(
            &self,
            key: &str,
            sink: &mut dyn Sink,
            _cache_control: &mut CacheControl,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n: u64 = key.parse().map_err(|_| Error::Origin(format!("bad fibonacci key {key:?}")))?;
            let value: u64 = if n < 2 {
                n
            } else {
                let group = self.group.get().expect("set right after the group is built").upgrade().expect("group outlives its origin");
                let a = fib_get(&group, n - 1).await?;
                let b = fib_get(&group, n - 2).await?;
                a + b
            };
            sink.write_all(value.to_string().as_bytes()).await
        }
    }

    async fn fib_get(group: &Group, n: u64) -> Result<u64> {
        let mut buf = Vec::new();
        let mut cc = CacheControl::default();
        let cancel = CancellationToken::new();
        get_async(group, &n.to_string(), &mut buf, &mut cc, &cancel).await?;
        String::from_utf8(buf).unwrap().parse().map_err(|_| Error::Origin("non-numeric fibonacci result".into()))
    }

    let calls1 = Arc::new(AtomicUsize::new(0));
    let cell1 = Arc::new(OnceLock::new());
    let group1 = GroupBuilder::new("Fibonacci", Arc::new(FibOrigin { group: cell1.clone(), calls: calls1.clone() }))
        .build(&p1.pool, &p1.registry)
        .await
        .unwrap();
    cell1.set(Arc::downgrade(&group1)).unwrap();

    let calls2 = Arc::new(AtomicUsize::new(0));
    let cell2 = Arc::new(OnceLock::new());
    let group2 = GroupBuilder::new("Fibonacci", Arc::new(FibOrigin { group: cell2.clone(), calls: calls2.clone() }))
        .build(&p2.pool, &p2.registry)
        .await
        .unwrap();
    cell2.set(Arc::downgrade(&group2)).unwrap();

    p1.pool.get_picker("Fibonacci").set(peers.clone());
    p2.pool.get_picker("Fibonacci").set(peers);

    let result = fib_get(&group1, 90).await.unwrap();
    assert_eq!(result, 2880067194370816120);
    assert_eq!(
        calls1.load(Ordering::SeqCst) + calls2.load(Ordering::SeqCst),
        91,
        "one origin call per distinct n in 0..=90, across both peers combined"
    );

    p1.cancel.cancel();
    p2.cancel.cancel();
}

#[tokio::test]
async fn scenario_6_owner_unreachable_falls_back_to_local() {
    let p1 = spawn_node().await;

    // p2 never gets a running server: just an address nothing is listening
    // on, so connection attempts fail fast instead of hanging.
    let p2_endpoint = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        PeerEndpoint::new("127.0.0.1", listener.local_addr().unwrap().port())
    };
    let peers = vec![p1.endpoint.clone(), p2_endpoint.clone()];

    let group = GroupBuilder::new("Unreachable", Arc::new(Echo)).build(&p1.pool, &p1.registry).await.unwrap();
    p1.pool.get_picker("Unreachable").set(peers);

    // Find a key whose owner is p2, so the replica loop's first attempt
    // actually exercises the unreachable peer.
    let key = (0..1000u32)
        .map(|i| i.to_string())
        .find(|k| {
            p1.pool
                .get_picker("Unreachable")
                .pick_peers(k, 1)
                .first()
                .map(|c| c.endpoint() == p2_endpoint)
                .unwrap_or(false)
        })
        .expect("some key must hash to p2 as owner");

    let cancel = CancellationToken::new();
    // Drive enough calls to trip the breaker (default max_retry 3), each
    // one still expected to succeed via the fallback local load.
    for _ in 0..5 {
        let mut cc = CacheControl::default();
        let mut sink = Vec::new();
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            get_async(&group, &key, &mut sink, &mut cc, &cancel),
        )
        .await
        .expect("fallback to local load must not hang even once the breaker is open");
        outcome.unwrap();
        assert_eq!(sink, key.as_bytes());
    }

    p1.cancel.cancel();
}
