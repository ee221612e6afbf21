//! C2: the fixed-count/fixed-charge ordered LRU map (`spec.md` §4.2).
//!
//! The teacher's own in-memory cache (`foyer-memory::cache::CacheShard`)
//! addresses entries through raw `NonNull<Handle>` pointers pooled in an
//! object queue for speed. This map keeps the same shape — a single lock
//! guarding an indexer plus an intrusive recency list, an object-pool-style
//! free list to avoid reallocating node slots — but swaps the raw pointers
//! for slab indices, which lets the whole thing stay in safe Rust. A slab
//! entry is the node equivalent of a `foyer` handle; `head`/`tail` and each
//! node's `prev`/`next` play the role the eviction container's handle list
//! plays there.

use std::collections::hash_map::Entry as HashMapEntry;
use std::hash::Hash;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::RwLock;

struct Node<K, V> {
    key: K,
    value: V,
    charge: usize,
    created_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    slab: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    /// Most-recently-used node.
    head: Option<usize>,
    /// Least-recently-used node.
    tail: Option<usize>,
    usage: usize,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slab[idx].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slab[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slab[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slab[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.slab[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn take_node(&mut self, idx: usize) -> Node<K, V> {
        self.unlink(idx);
        let node = self.slab[idx].take().unwrap();
        self.free.push(idx);
        self.usage -= node.charge;
        self.index.remove(&node.key);
        node
    }

    fn insert_node(&mut self, key: K, value: V, charge: usize) -> usize {
        let node = Node {
            key: key.clone(),
            value,
            charge,
            created_at: Instant::now(),
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slab[idx] = Some(node);
                idx
            }
            None => {
                self.slab.push(Some(node));
                self.slab.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.usage += charge;
        self.push_front(idx);
        idx
    }
}

/// A fixed-count, fixed-charge, optionally-TTL'd LRU map.
///
/// `max_entries == 0` disables count-based eviction; `capacity == 0`
/// disables charge-based eviction; `ttl == None` disables expiry.
pub struct LruMap<K, V> {
    inner: RwLock<Inner<K, V>>,
    max_entries: usize,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K, V> LruMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize, capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                slab: Vec::new(),
                free: Vec::new(),
                index: HashMap::new(),
                head: None,
                tail: None,
                usage: 0,
            }),
            max_entries,
            capacity,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn usage(&self) -> usize {
        self.inner.read().usage
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.read().index.contains_key(key)
    }

    /// Reads `key`, moving it to the front on a hit. Expired entries (by
    /// TTL) are removed and treated as a miss.
    pub fn try_get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.write();
        let idx = *inner.index.get(key)?;

        if let Some(ttl) = self.ttl {
            let created_at = inner.slab[idx].as_ref().unwrap().created_at;
            if created_at.elapsed() > ttl {
                inner.take_node(idx);
                return None;
            }
        }

        inner.touch(idx);
        Some(inner.slab[idx].as_ref().unwrap().value.clone())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.write();
        let idx = inner.index.get(key).copied()?;
        Some(inner.take_node(idx).value)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = Inner {
            slab: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            usage: 0,
        };
    }

    /// Returns a snapshot of (key, value) pairs from most- to
    /// least-recently-used.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        let inner = self.inner.read();
        let mut out = Vec::with_capacity(inner.index.len());
        let mut cur = inner.head;
        while let Some(idx) = cur {
            let node = inner.slab[idx].as_ref().unwrap();
            out.push((node.key.clone(), node.value.clone()));
            cur = node.next;
        }
        out
    }

    /// Inserts `key => value` with the given `charge`, moving an existing
    /// entry to the front and replacing its value.
    ///
    /// If `charge` alone exceeds `capacity`, the entry is **not** inserted
    /// and `on_over_capacity(key, value)` fires instead of `on_evicted`.
    /// Otherwise entries are evicted from the back until the map is within
    /// both `max_entries` and `capacity`, each firing `on_evicted`.
    pub fn add(
        &self,
        key: K,
        value: V,
        charge: usize,
        mut on_evicted: impl FnMut(K, V),
        mut on_over_capacity: impl FnMut(K, V),
    ) {
        let mut inner = self.inner.write();

        if self.capacity > 0 && charge > self.capacity {
            on_over_capacity(key, value);
            return;
        }

        if let Some(&idx) = inner.index.get(&key) {
            inner.take_node(idx);
        }

        let evicted = self.evict_to_fit(&mut inner, charge);
        inner.insert_node(key, value, charge);
        drop(inner);

        for (k, v) in evicted {
            on_evicted(k, v);
        }
    }

    /// Synchronous get-or-insert: returns the cached value on a hit, else
    /// calls `factory` and inserts its result.
    pub fn get_or_add(&self, key: K, charge_of: impl FnOnce(&V) -> usize, factory: impl FnOnce() -> V) -> V {
        if let Some(v) = self.try_get(&key) {
            return v;
        }
        let value = factory();
        let charge = charge_of(&value);
        self.add(key, value.clone(), charge, |_, _| {}, |_, _| {});
        value
    }

    fn evict_to_fit(&self, inner: &mut Inner<K, V>, incoming_charge: usize) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        loop {
            let over_count = self.max_entries > 0 && inner.index.len() >= self.max_entries;
            let over_capacity = self.capacity > 0 && inner.usage + incoming_charge > self.capacity;
            if !over_count && !over_capacity {
                break;
            }
            let Some(tail) = inner.tail else { break };
            let node = inner.take_node(tail);
            evicted.push((node.key, node.value));
        }
        evicted
    }
}
