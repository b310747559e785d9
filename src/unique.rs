//! Distinct-value counters over a sliding window.
//!
//! Same ring-rotation model as [`crate::window`], but each bucket is a
//! set of strings and the reported figure is the size of the union across
//! buckets — "how many distinct users/IPs/titles in the last hour",
//! exact to within one bucket width. A value seen in several buckets
//! counts once.
//!
//! [`UniqueValueStore`] keeps one counter per key with an optional cap.

use crate::clock::{default_clock, Clock};
use core::fmt;
use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::window::{DEFAULT_NUM_BUCKETS, DEFAULT_WINDOW};

struct UniqueCore {
    buckets: Vec<HashSet<String>>,
    current: usize,
    last_update: Instant,
    bucket_size: Duration,
}

impl UniqueCore {
    fn advance(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update);
        let steps = (elapsed.as_nanos() / self.bucket_size.as_nanos()) as u64;
        if steps == 0 {
            return;
        }
        let len = self.buckets.len();
        if steps >= len as u64 {
            for bucket in &mut self.buckets {
                bucket.clear();
            }
            self.current = 0;
            self.last_update = now;
            return;
        }
        for _ in 0..steps {
            self.current = (self.current + 1) % len;
            self.buckets[self.current].clear();
        }
        self.last_update += self.bucket_size * steps as u32;
    }

    fn union(&self) -> HashSet<&str> {
        let mut all: HashSet<&str> = HashSet::new();
        for bucket in &self.buckets {
            for value in bucket {
                all.insert(value.as_str());
            }
        }
        all
    }
}

/// Windowed distinct-value counter.
///
/// # Example
///
/// ```
/// use cachekit::unique::UniqueValueCounter;
/// use std::time::Duration;
///
/// let counter = UniqueValueCounter::new(Duration::from_secs(3600), 12);
/// counter.add("user-1");
/// counter.add("user-2");
/// counter.add("user-1");
/// assert_eq!(counter.count(), 2);
/// ```
pub struct UniqueValueCounter {
    core: Mutex<UniqueCore>,
    clock: Arc<dyn Clock>,
}

impl UniqueValueCounter {
    /// Creates a counter over `window` with `num_buckets` slots. Zero
    /// arguments fall back to [`DEFAULT_WINDOW`] / [`DEFAULT_NUM_BUCKETS`].
    pub fn new(window: Duration, num_buckets: usize) -> Self {
        Self::with_clock(window, num_buckets, default_clock())
    }

    /// Like [`UniqueValueCounter::new`] with an explicit time source.
    pub fn with_clock(window: Duration, num_buckets: usize, clock: Arc<dyn Clock>) -> Self {
        let window = if window.is_zero() { DEFAULT_WINDOW } else { window };
        let num_buckets = if num_buckets == 0 { DEFAULT_NUM_BUCKETS } else { num_buckets };
        let bucket_size = window / num_buckets as u32;
        let bucket_size = if bucket_size.is_zero() { Duration::from_nanos(1) } else { bucket_size };
        let now = clock.now();
        UniqueValueCounter {
            core: Mutex::new(UniqueCore {
                buckets: vec![HashSet::new(); num_buckets],
                current: 0,
                last_update: now,
                bucket_size,
            }),
            clock,
        }
    }

    /// Records a value in the current bucket.
    pub fn add(&self, value: &str) {
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.advance(now);
        let current = core.current;
        core.buckets[current].insert(value.to_owned());
    }

    /// Distinct values within the window.
    pub fn count(&self) -> usize {
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.advance(now);
        let len = core.union().len();
        len
    }

    /// Unordered copy of the distinct values within the window.
    pub fn get_unique(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.advance(now);
        core.union().into_iter().map(str::to_owned).collect()
    }

    /// Clears every bucket.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut core = self.core.lock();
        for bucket in &mut core.buckets {
            bucket.clear();
        }
        core.current = 0;
        core.last_update = now;
    }
}

impl fmt::Debug for UniqueValueCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("UniqueValueCounter")
            .field("buckets", &core.buckets.len())
            .field("bucket_size", &core.bucket_size)
            .finish()
    }
}

/// Per-key distinct-value counters with an optional key cap.
pub struct UniqueValueStore {
    counters: RwLock<HashMap<String, Arc<UniqueValueCounter>>>,
    window: Duration,
    num_buckets: usize,
    /// Key cap; 0 means unbounded.
    max_keys: usize,
    clock: Arc<dyn Clock>,
}

impl UniqueValueStore {
    /// Creates a store whose counters span `window` with `num_buckets`
    /// slots. `max_keys` of 0 means unbounded; at the cap, a new key
    /// evicts one arbitrary existing key.
    pub fn new(window: Duration, num_buckets: usize, max_keys: usize) -> Self {
        Self::with_clock(window, num_buckets, max_keys, default_clock())
    }

    /// Like [`UniqueValueStore::new`] with an explicit time source.
    pub fn with_clock(
        window: Duration,
        num_buckets: usize,
        max_keys: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        UniqueValueStore {
            counters: RwLock::new(HashMap::new()),
            window,
            num_buckets,
            max_keys,
            clock,
        }
    }

    /// Records `value` under `key`, creating the counter on first use.
    pub fn add(&self, key: &str, value: &str) {
        if let Some(counter) = self.counters.read().get(key).cloned() {
            counter.add(value);
            return;
        }
        let mut counters = self.counters.write();
        if !counters.contains_key(key) && self.max_keys > 0 && counters.len() >= self.max_keys {
            if let Some(victim) = counters.keys().next().cloned() {
                counters.remove(&victim);
            }
        }
        let counter = counters
            .entry(key.to_owned())
            .or_insert_with(|| {
                Arc::new(UniqueValueCounter::with_clock(
                    self.window,
                    self.num_buckets,
                    Arc::clone(&self.clock),
                ))
            })
            .clone();
        drop(counters);
        counter.add(value);
    }

    /// Distinct values recorded for `key` within the window; 0 for
    /// unknown keys.
    pub fn count(&self, key: &str) -> usize {
        match self.counters.read().get(key) {
            Some(counter) => counter.count(),
            None => 0,
        }
    }

    /// Unordered copy of the distinct values for `key`; empty for
    /// unknown keys.
    pub fn get_unique(&self, key: &str) -> Vec<String> {
        match self.counters.read().get(key) {
            Some(counter) => counter.get_unique(),
            None => Vec::new(),
        }
    }

    /// Drops counters whose windows have emptied; returns the count.
    pub fn cleanup_inactive(&self) -> usize {
        let mut counters = self.counters.write();
        let before = counters.len();
        counters.retain(|_, counter| counter.count() > 0);
        before - counters.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.counters.read().len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every counter.
    pub fn clear(&self) {
        self.counters.write().clear();
    }
}

impl fmt::Debug for UniqueValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueValueStore")
            .field("keys", &self.len())
            .field("max_keys", &self.max_keys)
            .finish()
    }
}
