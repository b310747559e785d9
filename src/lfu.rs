//! Least Frequently Used (LFU) cache with per-frequency recency tiebreak
//! and lazy TTL expiry.
//!
//! Entries are grouped into one doubly-linked list per access frequency:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          LfuCache                                │
//! │                                                                  │
//! │  HashMap<String, *Node>      BTreeMap<freq, List>                │
//! │  ┌──────────────┐            freq 1: [k9] ◀── min_freq           │
//! │  │ "k9" ────────────────▶    freq 2: [k4, k7]                    │
//! │  │ "k4" ────────────────▶    freq 5: [k1]                        │
//! │  └──────────────┘                                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A hit detaches the node from its frequency list and re-attaches it at
//! the front of the next-higher list; the allocation is reused, so the map
//! pointer stays stable. Eviction pops the back (least recently touched)
//! node of the lowest non-empty frequency list.
//!
//! Values are stored untyped as [`CachedValue`]; [`LfuCacheGeneric`] wraps
//! a cache with a fixed value type and downcasts on the way out.
//!
//! # Thread safety
//!
//! One `RwLock` per instance: mutating calls (including `get`, which bumps
//! frequency) take the write lock; [`LfuCache::contains`],
//! [`LfuCache::get_frequency`] and the snapshots take the read lock.

use crate::cacher::CachedValue;
use crate::clock::{default_clock, Clock};
use crate::list::{List, Node};
use crate::lru::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::stats::CacheStats;
use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) struct LfuEntry {
    key: String,
    value: CachedValue,
    freq: u64,
    expires_at: Instant,
}

/// Unsynchronized LFU algorithm.
///
/// # Safety
///
/// `map` stores raw pointers to nodes owned by exactly one of the lists in
/// `freq_lists`. Migrating a node between lists reuses its allocation, so
/// a key's pointer is stable until the entry is removed.
pub(crate) struct LfuCore {
    capacity: usize,
    default_ttl: Duration,
    /// Smallest frequency whose list is non-empty; 0 when the cache is empty.
    min_freq: u64,
    map: HashMap<String, *mut Node<LfuEntry>>,
    freq_lists: BTreeMap<u64, List<LfuEntry>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

// SAFETY: LfuCore owns all nodes reachable through `map`; pointers never
// escape and all mutation requires &mut self.
unsafe impl Send for LfuCore {}
// SAFETY: shared access only reads; no interior mutability.
unsafe impl Sync for LfuCore {}

impl LfuCore {
    fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let default_ttl = if default_ttl.is_zero() { DEFAULT_TTL } else { default_ttl };
        LfuCore {
            capacity,
            default_ttl,
            min_freq: 0,
            map: HashMap::new(),
            freq_lists: BTreeMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            total_keys: self.map.len() as u64,
            last_cleanup: None,
        }
    }

    fn get(&mut self, key: &str, now: Instant) -> Option<CachedValue> {
        let Some(&node) = self.map.get(key) else {
            self.misses += 1;
            return None;
        };
        // SAFETY: node comes from our map.
        let expired = unsafe { now > (*node).value().expires_at };
        if expired {
            self.remove_entry(key);
            self.misses += 1;
            return None;
        }
        self.bump_frequency(node);
        self.hits += 1;
        // SAFETY: node is still owned by a frequency list.
        Some(unsafe { (*node).value().value.clone() })
    }

    fn set(&mut self, key: &str, value: CachedValue, ttl: Duration, now: Instant) {
        let expires_at = now + ttl;
        if let Some(&node) = self.map.get(key) {
            // Overwrite, refresh expiry, and count the touch as an access.
            // SAFETY: node comes from our map.
            unsafe {
                let entry = (*node).value_mut();
                entry.value = value;
                entry.expires_at = expires_at;
            }
            self.bump_frequency(node);
            return;
        }
        if self.map.len() >= self.capacity {
            self.evict_one();
        }
        let node = self.freq_lists.entry(1).or_insert_with(List::new).push_front(LfuEntry {
            key: key.to_owned(),
            value,
            freq: 1,
            expires_at,
        });
        self.map.insert(key.to_owned(), node);
        self.min_freq = 1;
    }

    /// Read-only membership test; does not change frequency.
    fn contains(&self, key: &str, now: Instant) -> bool {
        match self.map.get(key) {
            // SAFETY: node comes from our map.
            Some(&node) => unsafe { now <= (*node).value().expires_at },
            None => false,
        }
    }

    /// Access frequency of a live key; 0 for unknown or expired keys.
    fn get_frequency(&self, key: &str, now: Instant) -> u64 {
        match self.map.get(key) {
            // SAFETY: node comes from our map.
            Some(&node) => unsafe {
                let entry = (*node).value();
                if now > entry.expires_at {
                    0
                } else {
                    entry.freq
                }
            },
            None => 0,
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.map.contains_key(key) {
            self.remove_entry(key);
            true
        } else {
            false
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.freq_lists.clear();
        self.min_freq = 0;
    }

    /// Moves `node` from its current frequency list to the front of the
    /// next-higher one. The allocation is reused, keeping the map pointer
    /// stable.
    fn bump_frequency(&mut self, node: *mut Node<LfuEntry>) {
        // SAFETY: node comes from our map and is linked into freq_lists[freq].
        let old_freq = unsafe { (*node).value().freq };
        let new_freq = old_freq + 1;
        let boxed = match self.freq_lists.get_mut(&old_freq) {
            // SAFETY: the entry's freq field names the list that owns it.
            Some(list) => unsafe { list.detach(node) },
            None => return,
        };
        if self.freq_lists.get(&old_freq).is_some_and(List::is_empty) {
            self.freq_lists.remove(&old_freq);
            if old_freq == self.min_freq {
                self.min_freq = new_freq;
            }
        }
        let reattached = self.freq_lists.entry(new_freq).or_insert_with(List::new).attach_front(boxed);
        debug_assert_eq!(reattached, node);
        // SAFETY: just re-attached; the pointer is valid.
        unsafe {
            (*reattached).value_mut().freq = new_freq;
        }
    }

    /// Evicts the least recently used entry of the lowest non-empty
    /// frequency list. `min_freq` is the fast path; an explicit remove may
    /// have left it stale, in which case the BTreeMap order finds the
    /// true minimum.
    fn evict_one(&mut self) {
        let freq = if self.freq_lists.get(&self.min_freq).is_some_and(|l| !l.is_empty()) {
            self.min_freq
        } else {
            match self.freq_lists.iter().find(|(_, l)| !l.is_empty()).map(|(f, _)| *f) {
                Some(f) => f,
                None => return,
            }
        };
        let victim = match self.freq_lists.get_mut(&freq) {
            Some(list) => list.pop_back(),
            None => None,
        };
        if let Some(node) = victim {
            let entry = node.into_value();
            self.map.remove(&entry.key);
            self.evictions += 1;
            if self.freq_lists.get(&freq).is_some_and(List::is_empty) {
                self.freq_lists.remove(&freq);
            }
        }
        if self.map.is_empty() {
            self.min_freq = 0;
        }
    }

    fn remove_entry(&mut self, key: &str) {
        let Some(node) = self.map.remove(key) else {
            return;
        };
        // SAFETY: node was just taken from our map; its freq field names
        // the owning list.
        let freq = unsafe { (*node).value().freq };
        if let Some(list) = self.freq_lists.get_mut(&freq) {
            // SAFETY: single detach of a linked node.
            unsafe {
                drop(list.detach(node).into_value());
            }
            if list.is_empty() {
                self.freq_lists.remove(&freq);
                if freq == self.min_freq {
                    self.min_freq = freq + 1;
                }
            }
        }
        if self.map.is_empty() {
            self.min_freq = 0;
        }
    }
}

impl fmt::Debug for LfuCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuCore")
            .field("capacity", &self.capacity)
            .field("len", &self.map.len())
            .field("min_freq", &self.min_freq)
            .finish()
    }
}

/// Thread-safe LFU cache over untyped values.
///
/// Eviction removes the least frequently used entry; ties within a
/// frequency are broken by recency (least recently touched first). Every
/// entry expires `ttl` after its last `set`.
pub struct LfuCache {
    core: RwLock<LfuCore>,
    clock: Arc<dyn Clock>,
}

impl LfuCache {
    /// Creates a cache holding at most `capacity` entries with the given
    /// default TTL. Zero arguments fall back to
    /// [`DEFAULT_CAPACITY`](crate::lru::DEFAULT_CAPACITY) /
    /// [`DEFAULT_TTL`](crate::lru::DEFAULT_TTL).
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, default_clock())
    }

    /// Like [`LfuCache::new`] with an explicit time source.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        LfuCache {
            core: RwLock::new(LfuCore::new(capacity, ttl)),
            clock,
        }
    }

    /// Returns the value and increments the entry's frequency. Expired
    /// entries are removed and reported as misses.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = self.clock.now();
        self.core.write().get(key, now)
    }

    /// Inserts or overwrites with the default TTL. Overwriting counts as
    /// an access (frequency + 1).
    pub fn set(&self, key: &str, value: CachedValue) {
        let now = self.clock.now();
        let ttl = self.core.read().default_ttl;
        self.core.write().set(key, value, ttl, now);
    }

    /// Inserts or overwrites with an explicit TTL.
    pub fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration) {
        let now = self.clock.now();
        let ttl = if ttl.is_zero() { self.core.read().default_ttl } else { ttl };
        self.core.write().set(key, value, ttl, now);
    }

    /// Read-only, TTL-respecting membership test; never changes frequency.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.core.read().contains(key, now)
    }

    /// Access frequency of a live key; 0 for unknown keys.
    pub fn get_frequency(&self, key: &str) -> u64 {
        let now = self.clock.now();
        self.core.read().get_frequency(key, now)
    }

    /// Removes the entry; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.core.write().remove(key)
    }

    /// Snapshot of counters and current size.
    pub fn stats(&self) -> CacheStats {
        self.core.read().stats()
    }

    /// Hit rate in percent.
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }

    /// Drops every entry. Counters are preserved.
    pub fn clear(&self) {
        self.core.write().clear();
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.core.read().len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LfuCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuCache")
            .field("core", &*self.core.read())
            .finish()
    }
}

/// Type-safe wrapper around [`LfuCache`] for a fixed value type.
///
/// A stored value of a different concrete type fails the downcast and is
/// reported as absent.
///
/// # Example
///
/// ```
/// use cachekit::lfu::LfuCacheGeneric;
/// use std::time::Duration;
///
/// let cache: LfuCacheGeneric<u64> = LfuCacheGeneric::new(100, Duration::from_secs(60));
/// cache.set("views", 42);
/// assert_eq!(cache.get("views"), Some(42));
/// assert_eq!(cache.get("missing"), None);
/// ```
pub struct LfuCacheGeneric<V> {
    inner: LfuCache,
    _marker: core::marker::PhantomData<fn() -> V>,
}

impl<V: Clone + Send + Sync + 'static> LfuCacheGeneric<V> {
    /// See [`LfuCache::new`].
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        LfuCacheGeneric {
            inner: LfuCache::new(capacity, ttl),
            _marker: core::marker::PhantomData,
        }
    }

    /// See [`LfuCache::with_clock`].
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        LfuCacheGeneric {
            inner: LfuCache::with_clock(capacity, ttl, clock),
            _marker: core::marker::PhantomData,
        }
    }

    /// Typed lookup. Returns `None` for missing, expired, or
    /// differently-typed entries.
    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.inner.get(key)?;
        value.downcast_ref::<V>().cloned()
    }

    /// Inserts with the default TTL.
    pub fn set(&self, key: &str, value: V) {
        self.inner.set(key, Arc::new(value) as CachedValue);
    }

    /// Inserts with an explicit TTL.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        self.inner.set_with_ttl(key, Arc::new(value) as CachedValue, ttl);
    }

    /// See [`LfuCache::contains`].
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    /// See [`LfuCache::get_frequency`].
    pub fn get_frequency(&self, key: &str) -> u64 {
        self.inner.get_frequency(key)
    }

    /// Removes the entry; returns whether it was present. Named after the
    /// [`Cacher`](crate::cacher::Cacher) shape this wrapper mirrors.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.remove(key)
    }

    /// See [`LfuCache::stats`].
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    /// See [`LfuCache::hit_rate`].
    pub fn hit_rate(&self) -> f64 {
        self.inner.hit_rate()
    }

    /// See [`LfuCache::clear`].
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// See [`LfuCache::len`].
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Access to the untyped cache, for callers that mix value types.
    pub fn untyped(&self) -> &LfuCache {
        &self.inner
    }
}

impl<V> fmt::Debug for LfuCacheGeneric<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuCacheGeneric")
            .field("inner", &self.inner)
            .finish()
    }
}
