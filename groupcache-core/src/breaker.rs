//! C7: the circuit breaker (`spec.md` §4.7), wrapping any [`PeerClient`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use groupcache_common::prelude::*;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::peer_client::PeerClient;

/// Wraps a `PeerClient` with a sequential-failure counter. Once the counter
/// reaches `max_retry`, calls fail fast with [`Error::BreakerOpen`] until
/// `back_off` has elapsed since the last attempt, at which point exactly one
/// probe is let through.
pub struct CircuitBreaker {
    inner: std::sync::Arc<dyn PeerClient>,
    max_retry: usize,
    back_off: Duration,
    failures: AtomicUsize,
    last_attempt: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(inner: std::sync::Arc<dyn PeerClient>, max_retry: usize, back_off: Duration) -> Self {
        Self {
            inner,
            max_retry,
            back_off,
            failures: AtomicUsize::new(0),
            last_attempt: Mutex::new(None),
        }
    }

    fn is_open(&self) -> bool {
        if self.max_retry == 0 || self.failures.load(Ordering::SeqCst) < self.max_retry {
            return false;
        }
        match *self.last_attempt.lock() {
            Some(last) => last.elapsed() < self.back_off,
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl PeerClient for CircuitBreaker {
    fn is_local(&self) -> bool {
        self.inner.is_local()
    }

    fn endpoint(&self) -> PeerEndpoint {
        self.inner.endpoint()
    }

    async fn get(
        &self,
        group_name: &str,
        key: &str,
        sink: &mut dyn Sink,
        cache_control: &mut CacheControl,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.is_open() {
            return Err(Error::BreakerOpen(self.inner.endpoint().authority()));
        }
        *self.last_attempt.lock() = Some(Instant::now());

        match self.inner.get(group_name, key, sink, cache_control, cancel).await {
            Ok(()) => {
                self.failures.store(0, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                // "Server busy" must not count toward tripping the breaker:
                // it reflects the peer's admission limiter, not its health.
                if err.kind() != ErrorKind::ServerBusy {
                    let max_retry = self.max_retry;
                    let _ = self
                        .failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| Some((f + 1).min(max_retry.max(1))));
                }
                Err(err)
            }
        }
    }
}
