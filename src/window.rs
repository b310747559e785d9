//! Sliding-window counters over a circular bucket ring.
//!
//! [`SlidingWindowCounter`] counts events within the trailing window with
//! bucket-width resolution. The window is divided into `num_buckets`
//! slots; `current` receives increments, and advancing time rotates the
//! ring, zeroing each slot as it becomes current:
//!
//! ```text
//! window 60s, 6 buckets (10s each):
//!
//!   [ 4 ][ 0 ][ 7 ][ 2 ][ 1 ][ 3 ]     count = 17
//!          ▲
//!       current
//!
//! 25s later (2 full buckets elapsed): rotate twice, zeroing on entry
//!
//!   [ 4 ][ 0 ][ 7 ][ 2 ][ 0 ][ 0 ]     count = 13
//!                              ▲
//!                           current
//! ```
//!
//! The reported count is therefore exact to within one bucket width.
//! A gap longer than the whole window resets every slot.
//!
//! [`SlidingWindowStore`] keeps one counter per key (per user, per IP)
//! with an optional key cap.
//!
//! # Thread safety
//!
//! Each counter is behind a `Mutex` — every call may rotate the ring, so
//! there are no read-only operations. The store's key map is behind a
//! `RwLock`; lookups share, insertion and eviction are exclusive.

use crate::clock::{default_clock, Clock};
use core::fmt;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bucket count substituted when a constructor receives 0.
pub const DEFAULT_NUM_BUCKETS: usize = 10;
/// Window substituted when a constructor receives a zero duration.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

struct WindowCore {
    buckets: Vec<u64>,
    current: usize,
    last_update: Instant,
    bucket_size: Duration,
}

impl WindowCore {
    /// Rotates the ring to account for time elapsed since the last
    /// advance. Advances in whole buckets only, so `last_update` moves in
    /// bucket-size steps and no fraction of elapsed time is lost.
    fn advance(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update);
        let steps = (elapsed.as_nanos() / self.bucket_size.as_nanos()) as u64;
        if steps == 0 {
            return;
        }
        let len = self.buckets.len();
        if steps >= len as u64 {
            self.buckets.fill(0);
            self.current = 0;
            self.last_update = now;
            return;
        }
        for _ in 0..steps {
            self.current = (self.current + 1) % len;
            self.buckets[self.current] = 0;
        }
        self.last_update += self.bucket_size * steps as u32;
    }
}

/// Event counter over the trailing time window.
///
/// # Example
///
/// ```
/// use cachekit::window::SlidingWindowCounter;
/// use std::time::Duration;
///
/// let counter = SlidingWindowCounter::new(Duration::from_secs(60), 6);
/// counter.increment();
/// counter.increment();
/// assert_eq!(counter.count(), 2);
/// ```
pub struct SlidingWindowCounter {
    core: Mutex<WindowCore>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowCounter {
    /// Creates a counter over `window`, divided into `num_buckets` slots.
    /// Zero arguments fall back to [`DEFAULT_WINDOW`] /
    /// [`DEFAULT_NUM_BUCKETS`].
    pub fn new(window: Duration, num_buckets: usize) -> Self {
        Self::with_clock(window, num_buckets, default_clock())
    }

    /// Like [`SlidingWindowCounter::new`] with an explicit time source.
    pub fn with_clock(window: Duration, num_buckets: usize, clock: Arc<dyn Clock>) -> Self {
        let window = if window.is_zero() { DEFAULT_WINDOW } else { window };
        let num_buckets = if num_buckets == 0 { DEFAULT_NUM_BUCKETS } else { num_buckets };
        let bucket_size = window / num_buckets as u32;
        let bucket_size = if bucket_size.is_zero() { Duration::from_nanos(1) } else { bucket_size };
        let now = clock.now();
        SlidingWindowCounter {
            core: Mutex::new(WindowCore {
                buckets: vec![0; num_buckets],
                current: 0,
                last_update: now,
                bucket_size,
            }),
            clock,
        }
    }

    /// Records one event in the current bucket.
    pub fn increment(&self) {
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.advance(now);
        let current = core.current;
        core.buckets[current] += 1;
    }

    /// Events recorded within the window, ± one bucket width.
    pub fn count(&self) -> u64 {
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.advance(now);
        core.buckets.iter().sum()
    }

    /// Zeroes every bucket.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.buckets.fill(0);
        core.current = 0;
        core.last_update = now;
    }
}

impl fmt::Debug for SlidingWindowCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("SlidingWindowCounter")
            .field("buckets", &core.buckets.len())
            .field("bucket_size", &core.bucket_size)
            .finish()
    }
}

/// Per-key sliding-window counters with an optional key cap.
pub struct SlidingWindowStore {
    counters: RwLock<HashMap<String, Arc<SlidingWindowCounter>>>,
    window: Duration,
    num_buckets: usize,
    /// Key cap; 0 means unbounded.
    max_keys: usize,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowStore {
    /// Creates a store whose counters span `window` with `num_buckets`
    /// slots. `max_keys` of 0 means unbounded; at the cap, inserting a
    /// new key evicts one arbitrary existing key.
    pub fn new(window: Duration, num_buckets: usize, max_keys: usize) -> Self {
        Self::with_clock(window, num_buckets, max_keys, default_clock())
    }

    /// Like [`SlidingWindowStore::new`] with an explicit time source.
    pub fn with_clock(
        window: Duration,
        num_buckets: usize,
        max_keys: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SlidingWindowStore {
            counters: RwLock::new(HashMap::new()),
            window,
            num_buckets,
            max_keys,
            clock,
        }
    }

    /// Records one event for `key`, creating its counter on first use.
    pub fn increment(&self, key: &str) {
        if let Some(counter) = self.counters.read().get(key).cloned() {
            counter.increment();
            return;
        }
        let mut counters = self.counters.write();
        if !counters.contains_key(key) && self.max_keys > 0 && counters.len() >= self.max_keys {
            // Any one key goes; map iteration order is as good as any.
            if let Some(victim) = counters.keys().next().cloned() {
                counters.remove(&victim);
            }
        }
        let counter = counters
            .entry(key.to_owned())
            .or_insert_with(|| {
                Arc::new(SlidingWindowCounter::with_clock(
                    self.window,
                    self.num_buckets,
                    Arc::clone(&self.clock),
                ))
            })
            .clone();
        drop(counters);
        counter.increment();
    }

    /// Windowed count for `key`; 0 for unknown keys.
    pub fn count(&self, key: &str) -> u64 {
        match self.counters.read().get(key) {
            Some(counter) => counter.count(),
            None => 0,
        }
    }

    /// Drops counters whose windowed count has decayed to zero; returns
    /// how many were removed.
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

impl fmt::Debug for SlidingWindowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowStore")
            .field("keys", &self.len())
            .field("max_keys", &self.max_keys)
            .finish()
    }
}
