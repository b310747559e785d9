//! Least Recently Used (LRU) cache with lazy TTL expiry.
//!
//! A fixed-capacity map from string keys to timestamps. All operations are
//! O(1) via a hash map pointing into a doubly-linked recency list:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         LruCache                               │
//! │                                                                │
//! │  HashMap<String, *Node>      Recency list                      │
//! │  ┌──────────────┐            ┌───────────────────────────┐     │
//! │  │ "sess-a" ───────────────▶ │ MRU ◀──▶ ... ◀──▶ LRU     │     │
//! │  │ "sess-b" ───────────────▶ │                           │     │
//! │  └──────────────┘            └───────────────────────────┘     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entry carries an absolute expiry (`now + ttl` at insert time).
//! Expiry is lazy: an expired entry is removed the moment a lookup touches
//! it, and [`LruCache::cleanup_expired`] sweeps the rest on demand.
//!
//! The stored value is itself a timestamp — this cache answers "when did I
//! last see this key?", which is what the deduplication caches
//! ([`crate::dedup`]) need. [`LruCache::is_duplicate`] is the atomic
//! test-and-record used on that path.
//!
//! # Eviction
//!
//! ```text
//! capacity 3:
//! add "a","b","c"   →  [c, b, a]
//! get "a"           →  [a, c, b]
//! add "d"           →  [d, a, c]      "b" evicted (LRU)
//! ```
//!
//! # Thread safety
//!
//! Internally synchronized with a single `RwLock`: lookups that update
//! recency take the write lock, [`LruCache::contains`] and the snapshot
//! accessors take the read lock. Instances can be shared via `Arc`.

use crate::clock::{default_clock, Clock};
use crate::list::{List, Node};
use crate::stats::LruStats;
use chrono::{DateTime, Utc};
use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity substituted when a constructor receives 0.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// TTL substituted when a constructor receives a zero duration.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub(crate) struct LruEntry {
    key: String,
    value: DateTime<Utc>,
    expires_at: Instant,
}

/// Unsynchronized LRU algorithm, shared between [`LruCache`] and the
/// deduplication caches that embed one behind their own locking.
///
/// # Safety
///
/// `map` stores raw pointers to nodes owned by `list`. A pointer is valid
/// from the `push_front` that created it until the matching detach; every
/// mutation below removes or rewires map entry and list node together.
pub(crate) struct LruCore {
    capacity: usize,
    ttl: Duration,
    list: List<LruEntry>,
    map: HashMap<String, *mut Node<LruEntry>>,
    hits: u64,
    misses: u64,
}

// SAFETY: LruCore owns all nodes reachable through `map`; the pointers never
// escape and all mutation requires &mut self.
unsafe impl Send for LruCore {}
// SAFETY: shared access only reads; no interior mutability.
unsafe impl Sync for LruCore {}

impl LruCore {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        LruCore {
            capacity,
            ttl,
            list: List::new(),
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn stats(&self) -> LruStats {
        LruStats {
            hits: self.hits,
            misses: self.misses,
            size: self.map.len(),
        }
    }

    pub(crate) fn get(&mut self, key: &str, now: Instant) -> Option<DateTime<Utc>> {
        let Some(&node) = self.map.get(key) else {
            self.misses += 1;
            return None;
        };
        // SAFETY: node comes from our map.
        let expired = unsafe { now > (*node).value().expires_at };
        if expired {
            self.remove_node(key, node);
            self.misses += 1;
            return None;
        }
        // SAFETY: node comes from our map and is still linked.
        unsafe {
            self.list.move_to_front(node);
            self.hits += 1;
            Some((*node).value().value)
        }
    }

    /// TTL-respecting membership test. Does not touch recency or counters.
    pub(crate) fn contains(&self, key: &str, now: Instant) -> bool {
        match self.map.get(key) {
            // SAFETY: node comes from our map.
            Some(&node) => unsafe { now <= (*node).value().expires_at },
            None => false,
        }
    }

    pub(crate) fn add(&mut self, key: &str, value: DateTime<Utc>, now: Instant) {
        let expires_at = now + self.ttl;
        if let Some(&node) = self.map.get(key) {
            // SAFETY: node comes from our map and is still linked.
            unsafe {
                self.list.move_to_front(node);
                let entry = (*node).value_mut();
                entry.value = value;
                entry.expires_at = expires_at;
            }
            return;
        }
        let node = self.list.push_front(LruEntry {
            key: key.to_owned(),
            value,
            expires_at,
        });
        self.map.insert(key.to_owned(), node);
        while self.map.len() > self.capacity {
            if !self.evict_lru() {
                break;
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        match self.map.remove(key) {
            Some(node) => {
                // SAFETY: node was just taken from our map.
                unsafe {
                    drop(self.list.detach(node).into_value());
                }
                true
            }
            None => false,
        }
    }

    /// Atomic test-and-record: true iff `key` is already present and live
    /// (counted as a hit, moved to MRU); otherwise records a fresh entry
    /// stamped `value` and reports a miss.
    pub(crate) fn is_duplicate(&mut self, key: &str, value: DateTime<Utc>, now: Instant) -> bool {
        if let Some(&node) = self.map.get(key) {
            // SAFETY: node comes from our map.
            let expired = unsafe { now > (*node).value().expires_at };
            if !expired {
                // SAFETY: still linked.
                unsafe { self.list.move_to_front(node) };
                self.hits += 1;
                return true;
            }
            self.remove_node(key, node);
        }
        self.misses += 1;
        self.add(key, value, now);
        false
    }

    /// Removes every expired entry, walking from the LRU end to the MRU
    /// end. The walk covers the whole list: recency order says nothing
    /// about expiry order once entries have been refreshed.
    pub(crate) fn cleanup_expired(&mut self, now: Instant) -> usize {
        let mut doomed: Vec<*mut Node<LruEntry>> = Vec::new();
        let mut cursor = self.list.back();
        while let Some(node) = cursor {
            // SAFETY: the cursor only visits linked non-sigil nodes, and
            // nothing is detached until the walk finishes.
            unsafe {
                if now > (*node).value().expires_at {
                    doomed.push(node);
                }
                cursor = self.list.toward_front(node);
            }
        }
        let removed = doomed.len();
        for node in doomed {
            // SAFETY: collected from the walk above; each is detached once.
            unsafe {
                let entry = self.list.detach(node).into_value();
                self.map.remove(&entry.key);
            }
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }

    fn evict_lru(&mut self) -> bool {
        match self.list.pop_back() {
            Some(node) => {
                let entry = node.into_value();
                self.map.remove(&entry.key);
                true
            }
            None => false,
        }
    }

    fn remove_node(&mut self, key: &str, node: *mut Node<LruEntry>) {
        self.map.remove(key);
        // SAFETY: node was reachable from the map a moment ago and the map
        // entry is gone, so this is the single detach.
        unsafe {
            drop(self.list.detach(node).into_value());
        }
    }
}

impl fmt::Debug for LruCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.map.len())
            .finish()
    }
}

/// Thread-safe LRU cache from string keys to timestamps, with lazy TTL.
///
/// # Example
///
/// ```
/// use cachekit::lru::LruCache;
/// use chrono::Utc;
/// use std::time::Duration;
///
/// let cache = LruCache::new(3, Duration::from_secs(60));
/// cache.add("a", Utc::now());
/// cache.add("b", Utc::now());
/// cache.add("c", Utc::now());
/// cache.get("a");              // "a" becomes MRU
/// cache.add("d", Utc::now());  // "b" evicted (LRU)
///
/// assert!(!cache.contains("b"));
/// assert!(cache.contains("a"));
/// assert!(cache.contains("c"));
/// assert!(cache.contains("d"));
/// ```
pub struct LruCache {
    core: RwLock<LruCore>,
    clock: Arc<dyn Clock>,
}

impl LruCache {
    /// Creates a cache holding at most `capacity` entries, each live for
    /// `ttl` after its last [`LruCache::add`].
    ///
    /// A zero `capacity` falls back to [`DEFAULT_CAPACITY`], a zero `ttl`
    /// to [`DEFAULT_TTL`].
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, default_clock())
    }

    /// Like [`LruCache::new`] with an explicit time source.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        LruCache {
            core: RwLock::new(LruCore::new(capacity, ttl)),
            clock,
        }
    }

    /// Returns the stored timestamp and refreshes recency. An expired
    /// entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.core.write().get(key, now)
    }

    /// TTL-respecting membership test; never updates recency.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.core.read().contains(key, now)
    }

    /// Inserts or refreshes an entry, making it MRU. Evicts from the LRU
    /// end until the capacity bound holds again.
    pub fn add(&self, key: &str, value: DateTime<Utc>) {
        let now = self.clock.now();
        self.core.write().add(key, value, now);
    }

    /// Removes the entry; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.core.write().remove(key)
    }

    /// Atomic test-and-record: true iff the key was already present and
    /// live. On false the key is recorded with the current wall time.
    pub fn is_duplicate(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.core.write().is_duplicate(key, Utc::now(), now)
    }

    /// Removes all expired entries and returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        self.core.write().cleanup_expired(now)
    }

    /// Snapshot of hit/miss counters and current size.
    pub fn stats(&self) -> LruStats {
        self.core.read().stats()
    }

    /// Drops every entry. Counters are preserved.
    pub fn clear(&self) {
        self.core.write().clear();
    }

    /// Current number of entries (live plus not-yet-collected expired).
    pub fn len(&self) -> usize {
        self.core.read().len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LruCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("core", &*self.core.read())
            .finish()
    }
}
