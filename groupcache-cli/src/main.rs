//! Demo binary: stands up a single groupcache peer node — an HTTP peer
//! server plus one demo group — wired to a static peer list given on the
//! command line. A real deployment supplies its own [`OriginLoader`]; this
//! binary's own origin just echoes each key back as its value, so operators
//! can poke a running cluster with `curl` and see coherent answers bounce
//! between peers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use groupcache::prelude::*;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "groupcache-cli", version, about = "stand up a groupcache peer node")]
struct Args {
    /// Host this node's peer server binds to and advertises to the rest of
    /// the peer set.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port this node's peer server listens on.
    #[arg(long)]
    port: u16,

    /// `host:port` of every peer in the cluster, including this node's own
    /// endpoint. Repeat the flag once per peer.
    #[arg(long = "peer", value_name = "HOST:PORT")]
    peers: Vec<String>,

    /// Name of the demo group this node participates in.
    #[arg(long, default_value = "demo")]
    group: String,

    /// In-flight request ceiling enforced by the admission limiter.
    #[arg(long, default_value_t = 24)]
    admission_limit: usize,

    /// Capacity of the in-memory cache tier.
    #[arg(long, default_value = "64MiB")]
    memory_cache_size: bytesize::ByteSize,

    /// Bind address for the Prometheus metrics exporter. Omit to disable.
    #[arg(long, value_name = "HOST:PORT")]
    metrics_addr: Option<SocketAddr>,
}

struct EchoOrigin;

#[async_trait::async_trait]
impl OriginLoader for EchoOrigin {
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

fn parse_endpoint(spec: &str) -> anyhow::Result<PeerEndpoint> {
    let (host, port) = spec.rsplit_once(':').with_context(|| format!("peer {spec:?} must be HOST:PORT"))?;
    let port: u16 = port.parse().with_context(|| format!("peer {spec:?} has a non-numeric port"))?;
    Ok(PeerEndpoint::new(host, port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    if let Some(addr) = args.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install the Prometheus metrics exporter")?;
        tracing::info!(%addr, "metrics exporter listening");
    }

    let self_endpoint = PeerEndpoint::new(&args.host, args.port);
    let peers = args.peers.iter().map(|spec| parse_endpoint(spec)).collect::<anyhow::Result<Vec<_>>>()?;

    let pool = PeerPool::new(
        self_endpoint.clone(),
        PeerPoolConfig {
            admission_limit: args.admission_limit,
            ..PeerPoolConfig::default()
        },
    );
    let registry = Registry::new();

    let stats: Arc<dyn Stats> = match args.metrics_addr {
        Some(_) => Arc::new(MetricsStats::new(Box::leak(args.group.clone().into_boxed_str()))),
        None => Arc::new(NullStats),
    };

    // Registered groups are looked up by the server through the registry, not
    // held directly by this binary, so the built `Arc<Group>` has no further
    // use here.
    GroupBuilder::new(args.group.clone(), Arc::new(EchoOrigin))
        .stats(stats)
        .memory_cache(MemoryCacheConfig {
            capacity: args.memory_cache_size.as_u64() as usize,
            ..MemoryCacheConfig::default()
        })
        .build(&pool, &registry)
        .await
        .context("failed to build the demo group")?;

    pool.get_picker(&args.group).set(peers);

    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?;

    let registry = Arc::new(registry);
    let cancel = CancellationToken::new();

    tracing::info!(endpoint = %self_endpoint, group = %args.group, "groupcache node ready");

    let server = tokio::spawn(serve(listener, registry, pool.clone(), cancel.clone()));

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    cancel.cancel();
    server.await.context("server task panicked")?.context("server exited with an error")?;

    Ok(())
}
