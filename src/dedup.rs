//! Deduplication caches.
//!
//! Both variants answer one question — "have I seen this key recently?" —
//! with an atomic test-and-record:
//!
//! - [`BloomLru`] fronts the authoritative LRU with a Bloom filter. A
//!   Bloom negative proves the key is new and short-circuits without
//!   touching the LRU; a positive falls through to the exact check. The
//!   Bloom bits are monotonic: TTL expiry cleans only the LRU side, bits
//!   accumulate until [`BloomLru::clear`].
//! - [`ExactLru`] is the plain LRU check: zero false positives, at the
//!   cost of storing every key.
//!
//! Both implement the [`DeduplicationCache`] contract so callers can swap
//! variants by construction alone.

use crate::bloom::BloomFilter;
use crate::clock::Clock;
use crate::lru::LruCache;
use crate::stats::DedupStats;
use chrono::Utc;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// False-positive rate used for the embedded Bloom filter.
const BLOOM_FP_RATE: f64 = 0.01;

/// Common contract of the deduplication caches.
pub trait DeduplicationCache: Send + Sync {
    /// Atomic test-and-record: true iff the key was recorded before and
    /// has not expired. False records the key.
    fn is_duplicate(&self, key: &str) -> bool;

    /// Side-effect-free membership test.
    fn contains(&self, key: &str) -> bool;

    /// Unconditionally records the key.
    fn record(&self, key: &str);

    /// Drops expired entries from the exact store; returns the count.
    fn cleanup_expired(&self) -> usize;

    /// Drops all state (including Bloom bits, where present).
    fn clear(&self);

    /// Number of keys currently tracked exactly.
    fn len(&self) -> usize;

    /// Counter snapshot.
    fn stats(&self) -> DedupStats;
}

#[derive(Debug, Default)]
struct DedupCounters {
    bloom_negatives: u64,
    lru_checks: u64,
    duplicates: u64,
}

/// Bloom-fronted deduplication cache.
///
/// # Example
///
/// ```
/// use cachekit::dedup::{BloomLru, DeduplicationCache};
/// use std::time::Duration;
///
/// let dedup = BloomLru::new(1000, Duration::from_secs(60));
/// assert!(!dedup.is_duplicate("event-1"));
/// assert!(dedup.is_duplicate("event-1"));
/// ```
pub struct BloomLru {
    bloom: BloomFilter,
    lru: LruCache,
    counters: Mutex<DedupCounters>,
}

impl BloomLru {
    /// Creates a deduplicator tracking up to `capacity` keys exactly, each
    /// for `ttl`. The Bloom filter is sized for `capacity` items at a 1%
    /// false-positive rate.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        BloomLru {
            bloom: BloomFilter::new(capacity.max(1), BLOOM_FP_RATE),
            lru: LruCache::new(capacity, ttl),
            counters: Mutex::new(DedupCounters::default()),
        }
    }

    /// Like [`BloomLru::new`] with an explicit time source for the LRU.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        BloomLru {
            bloom: BloomFilter::new(capacity.max(1), BLOOM_FP_RATE),
            lru: LruCache::with_clock(capacity, ttl, clock),
            counters: Mutex::new(DedupCounters::default()),
        }
    }
}

impl DeduplicationCache for BloomLru {
    fn is_duplicate(&self, key: &str) -> bool {
        if !self.bloom.test(key) {
            // Definitely new: record in both structures, skip the LRU probe.
            self.counters.lock().bloom_negatives += 1;
            self.bloom.add(key);
            self.lru.add(key, Utc::now());
            return false;
        }
        self.counters.lock().lru_checks += 1;
        if self.lru.is_duplicate(key) {
            self.counters.lock().duplicates += 1;
            true
        } else {
            // Bloom false positive, or the exact entry expired. The LRU
            // re-recorded the key; keep the bloom bits in sync.
            self.bloom.add(key);
            false
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.bloom.test(key) && self.lru.contains(key)
    }

    fn record(&self, key: &str) {
        self.bloom.add(key);
        self.lru.add(key, Utc::now());
    }

    fn cleanup_expired(&self) -> usize {
        // Bloom bits are left in place: no deletion on a Bloom filter.
        self.lru.cleanup_expired()
    }

    fn clear(&self) {
        self.bloom.clear();
        self.lru.clear();
    }

    fn len(&self) -> usize {
        self.lru.len()
    }

    fn stats(&self) -> DedupStats {
        let counters = self.counters.lock();
        DedupStats {
            bloom_negatives: counters.bloom_negatives,
            lru_checks: counters.lru_checks,
            duplicates: counters.duplicates,
            lru_size: self.lru.len(),
        }
    }
}

impl fmt::Debug for BloomLru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomLru")
            .field("bloom", &self.bloom)
            .field("lru_size", &self.lru.len())
            .finish()
    }
}

/// Exact deduplication cache: the LRU alone, zero false positives.
pub struct ExactLru {
    lru: LruCache,
    counters: Mutex<DedupCounters>,
}

impl ExactLru {
    /// Creates a deduplicator tracking up to `capacity` keys, each for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        ExactLru {
            lru: LruCache::new(capacity, ttl),
            counters: Mutex::new(DedupCounters::default()),
        }
    }

    /// Like [`ExactLru::new`] with an explicit time source.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        ExactLru {
            lru: LruCache::with_clock(capacity, ttl, clock),
            counters: Mutex::new(DedupCounters::default()),
        }
    }
}

impl DeduplicationCache for ExactLru {
    fn is_duplicate(&self, key: &str) -> bool {
        self.counters.lock().lru_checks += 1;
        let duplicate = self.lru.is_duplicate(key);
        if duplicate {
            self.counters.lock().duplicates += 1;
        }
        duplicate
    }

    fn contains(&self, key: &str) -> bool {
        self.lru.contains(key)
    }

    fn record(&self, key: &str) {
        self.lru.add(key, Utc::now());
    }

    fn cleanup_expired(&self) -> usize {
        self.lru.cleanup_expired()
    }

    fn clear(&self) {
        self.lru.clear();
    }

    fn len(&self) -> usize {
        self.lru.len()
    }

    fn stats(&self) -> DedupStats {
        let counters = self.counters.lock();
        DedupStats {
            bloom_negatives: 0,
            lru_checks: counters.lru_checks,
            duplicates: counters.duplicates,
            lru_size: self.lru.len(),
        }
    }
}

impl fmt::Debug for ExactLru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactLru")
            .field("lru_size", &self.lru.len())
            .finish()
    }
}
