//! The stats capability from `spec.md` §6: a thread-safe sink of named
//! counters and timers. A null implementation is always available so a
//! `Group` can be built without wiring a real backend.

use std::time::Duration;

/// Counters and timers traced by the orchestrator, the peer pool and the
/// caches. Implementations must be `Send + Sync` and safe to call from any
/// number of concurrent tasks.
pub trait Stats: Send + Sync + 'static {
    fn trace_gets(&self) {}
    fn trace_cache_hits(&self) {}
    fn trace_loads_deduped(&self) {}
    fn trace_local_loads(&self) {}
    fn trace_peer_loads(&self) {}
    fn trace_server_requests(&self) {}
    fn trace_roundtrip_latency(&self, _elapsed: Duration) {}
    fn trace_retry(&self) {}
    fn trace_item_over_capacity(&self) {}
    fn trace_concurrent_server_requests(&self, _n: usize) {}
}

/// The always-available no-op [`Stats`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStats;

impl Stats for NullStats {}

#[cfg(feature = "metrics-stats")]
mod metrics_stats {
    use super::Stats;
    use std::time::Duration;

    /// Records the same counters through the `metrics` facade. Feature-gated
    /// behind `metrics-stats` so library consumers who don't want a metrics
    /// dependency don't pay for it (mirrors how `foyer`'s `metrics` crate
    /// dependency is a plain, always-on facade dependency but the exporter
    /// itself is left to the binary crate, see `foyer-bench`).
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MetricsStats {
        group: &'static str,
    }

    impl MetricsStats {
        pub fn new(group: &'static str) -> Self {
            Self { group }
        }
    }

    impl Stats for MetricsStats {
        fn trace_gets(&self) {
            metrics::counter!("groupcache_gets_total", "group" => self.group).increment(1);
        }
        fn trace_cache_hits(&self) {
            metrics::counter!("groupcache_cache_hits_total", "group" => self.group).increment(1);
        }
        fn trace_loads_deduped(&self) {
            metrics::counter!("groupcache_loads_deduped_total", "group" => self.group).increment(1);
        }
        fn trace_local_loads(&self) {
            metrics::counter!("groupcache_local_loads_total", "group" => self.group).increment(1);
        }
        fn trace_peer_loads(&self) {
            metrics::counter!("groupcache_peer_loads_total", "group" => self.group).increment(1);
        }
        fn trace_server_requests(&self) {
            metrics::counter!("groupcache_server_requests_total", "group" => self.group).increment(1);
        }
        fn trace_roundtrip_latency(&self, elapsed: Duration) {
            metrics::histogram!("groupcache_roundtrip_latency_seconds", "group" => self.group)
                .record(elapsed.as_secs_f64());
        }
        fn trace_retry(&self) {
            metrics::counter!("groupcache_retries_total", "group" => self.group).increment(1);
        }
        fn trace_item_over_capacity(&self) {
            metrics::counter!("groupcache_item_over_capacity_total", "group" => self.group).increment(1);
        }
        fn trace_concurrent_server_requests(&self, n: usize) {
            metrics::gauge!("groupcache_concurrent_server_requests", "group" => self.group).set(n as f64);
        }
    }
}

#[cfg(feature = "metrics-stats")]
pub use metrics_stats::MetricsStats;
