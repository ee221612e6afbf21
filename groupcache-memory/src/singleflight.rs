//! C3: per-key coalescing of in-flight async fills (`spec.md` §4.3).
//!
//! Grounded on the waiter bookkeeping in `foyer-memory::cache::Cache::entry`
//! (a `HashMap<K, Vec<oneshot::Sender<..>>>` guarded by the shard lock, with
//! the first caller becoming the leader and everyone else installing a
//! `oneshot` receiver). This module lifts that pattern out of the cache
//! shard into a standalone, cache-agnostic gate so C5 and C6 can each wrap
//! their own store with it.

use std::collections::hash_map::Entry as HashMapEntry;
use std::future::Future;
use std::hash::Hash;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

type Waiters<V, E> = Vec<oneshot::Sender<Result<V, E>>>;

/// Coalesces concurrent calls for the same key into a single execution of
/// `factory`. `V` and `E` must be `Clone` because the leader's result (value
/// or error) is fanned out identically to every follower.
pub struct SingleFlight<K, V, E> {
    flights: Mutex<HashMap<K, Waiters<V, E>>>,
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys with an in-flight fill. Exposed for tests
    /// and for stats wiring that wants to distinguish a coalesced call from
    /// a fresh one.
    pub fn in_flight_count(&self) -> usize {
        self.flights.lock().len()
    }

    /// Runs `factory` at most once per key among concurrent callers.
    ///
    /// The leader (first caller for a cold key) installs the flight,
    /// awaits `factory`, removes the flight, and fans the result out to any
    /// followers that arrived meanwhile. Followers simply await the
    /// leader's result. On leader panic the flight is still removed so the
    /// next arrival starts a fresh fill, never leaking a slot.
    pub async fn do_async<F, Fut>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        self.do_async_with_role(key, factory).await.0
    }

    /// Same as [`Self::do_async`], but also reports whether this call
    /// coalesced onto another caller's in-flight fill (`true`) rather than
    /// running `factory` itself (`false`) — stats wiring uses this to trace
    /// deduped loads separately from genuine misses.
    pub async fn do_async_with_role<F, Fut>(&self, key: K, factory: F) -> (Result<V, E>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        enum Role<V, E> {
            Leader,
            Follower(oneshot::Receiver<Result<V, E>>),
        }

        let role = {
            let mut flights = self.flights.lock();
            match flights.entry(key.clone()) {
                HashMapEntry::Occupied(mut o) => {
                    let (tx, rx) = oneshot::channel();
                    o.get_mut().push(tx);
                    Role::Follower(rx)
                }
                HashMapEntry::Vacant(v) => {
                    v.insert(Vec::new());
                    Role::Leader
                }
            }
        };

        match role {
            // If the leader's sender was dropped without sending (the
            // leader task panicked or was aborted while `factory` was
            // running), the flight slot is gone and nothing will ever
            // resolve this receiver. Re-entering `do_async` makes this
            // follower become the new leader instead of hanging forever.
            Role::Follower(rx) => match rx.await {
                Ok(result) => (result, true),
                Err(_) => Box::pin(self.do_async_with_role(key, factory)).await,
            },
            Role::Leader => {
                // If `factory` panics, this guard's `Drop` still removes the
                // flight slot, so the key is never left permanently stuck.
                let _guard = RemoveOnDrop {
                    flights: &self.flights,
                    key: key.clone(),
                };
                let result = factory().await;
                let waiters = { self.flights.lock().remove(&key) }.unwrap_or_default();
                for tx in waiters {
                    let _ = tx.send(result.clone());
                }
                (result, false)
            }
        }
    }
}

/// Ensures the flight slot is removed even if `factory` panics, so a panic
/// never leaves the gate permanently blocked for that key.
struct RemoveOnDrop<'a, K, V, E>
where
    K: Eq + Hash + Clone,
{
    flights: &'a Mutex<HashMap<K, Waiters<V, E>>>,
    key: K,
}

impl<K, V, E> Drop for RemoveOnDrop<'_, K, V, E>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.flights.lock().remove(&self.key);
    }
}
