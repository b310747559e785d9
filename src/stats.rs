//! Statistics reported by the caches.
//!
//! Each cache family exposes a small snapshot struct rather than a generic
//! metrics map: callers consume these values directly (dashboards, API
//! responses), so the fields are fixed and serializable.
//!
//! Counters are monotonic for the lifetime of the cache except
//! `total_keys`, which is a gauge.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of a [`Cacher`](crate::cacher::Cacher)-style cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a live entry.
    pub hits: u64,
    /// Lookups that found nothing, or only an expired entry.
    pub misses: u64,
    /// Entries removed by TTL expiry, explicit deletes, or capacity.
    pub evictions: u64,
    /// Current number of stored keys (gauge).
    pub total_keys: u64,
    /// Completion time of the most recent background sweep, if any ran.
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Hit rate in percent: `100 * hits / (hits + misses)`, 0 when idle.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        100.0 * self.hits as f64 / total as f64
    }
}

/// Snapshot of an [`LruCache`](crate::lru::LruCache).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LruStats {
    /// Lookups that returned a live entry.
    pub hits: u64,
    /// Lookups that found nothing, or only an expired entry.
    pub misses: u64,
    /// Current number of stored keys (gauge).
    pub size: usize,
}

/// Snapshot of a deduplication cache.
///
/// `bloom_negatives` counts keys the Bloom filter rejected outright
/// (definitely new, LRU never consulted); it stays 0 for the exact
/// variant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    /// Keys short-circuited by a Bloom-filter negative.
    pub bloom_negatives: u64,
    /// Keys that reached the authoritative LRU check.
    pub lru_checks: u64,
    /// Keys confirmed as duplicates.
    pub duplicates: u64,
    /// Current number of keys tracked by the LRU (gauge).
    pub lru_size: usize,
}
