//! # cachekit
//!
//! Concurrent, in-memory data structures for a media-analytics server:
//! caching, deduplication, rate limiting, temporal aggregation,
//! geospatial proximity, multi-pattern string matching, and prefix
//! autocomplete. Every structure is internally synchronized, performs no
//! I/O, and keeps all state process-local.
//!
//! ## Which Structure Should I Use?
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │ "Have I seen this key recently?"          → BloomLru / ExactLru          │
//! │ "Cache responses, evict the coldest"      → LruCache / LfuCache / Cacher │
//! │ "Cache responses, expire on a timer"      → TtlCache                     │
//! │ "How many events in the last N minutes?"  → SlidingWindowCounter         │
//! │ "How many distinct users in the window?"  → UniqueValueCounter           │
//! │ "Plays per time slot, range-summable"     → TemporalFenwickTree          │
//! │ "What is the oldest pending item?"        → MinHeap                      │
//! │ "Who is within 50 km of here?"            → SpatialHashGrid              │
//! │ "Complete this search prefix"             → Trie / TrieIndex             │
//! │ "Which known substrings appear here?"     → AhoCorasick / PatternMatcher │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Purpose | Core cost |
//! |------|---------|-----------|
//! | [`LruCache`] | LRU with lazy TTL | O(1) |
//! | [`LfuCache`] | LFU, recency tiebreak, lazy TTL | O(1) |
//! | [`BloomFilter`] | Probabilistic membership | O(k) |
//! | [`BloomLru`] / [`ExactLru`] | Deduplication | O(1) |
//! | [`TtlCache`] | Keyed values with expiry + sweep | O(1) |
//! | [`MinHeap`] | Timestamp-ordered queue with keyed access | O(log n) |
//! | [`SlidingWindowCounter`] | Windowed event count | O(buckets) |
//! | [`UniqueValueCounter`] | Windowed distinct count | O(values) |
//! | [`FenwickTree`] / [`TemporalFenwickTree`] | Prefix/range sums | O(log n) |
//! | [`SpatialHashGrid`] | Radius queries over (lat, lon) | O(cells + hits) |
//! | [`Trie`] / [`TrieIndex`] | Ranked autocomplete | O(len + results) |
//! | [`AhoCorasick`] | Multi-pattern search | O(text + matches) |
//!
//! ## Conventions
//!
//! - **No errors.** Lookups return `Option`/`bool`; out-of-range indices
//!   and times clamp or no-op; constructors substitute documented
//!   defaults for zero arguments. Nothing here returns `Result`.
//! - **Internal locking.** Every public type is safe to share via `Arc`
//!   with no external synchronization. Snapshots (`stats`, `len`,
//!   `get_unique`, `all`) are copies.
//! - **Pluggable time.** Structures that expire or rotate state read the
//!   clock through [`clock::Clock`]; tests inject a
//!   [`clock::ManualClock`] and never sleep.
//!
//! ## Example
//!
//! ```
//! use cachekit::{BloomLru, DeduplicationCache, SlidingWindowStore};
//! use std::time::Duration;
//!
//! // Drop replayed webhook events...
//! let seen = BloomLru::new(100_000, Duration::from_secs(600));
//! assert!(!seen.is_duplicate("evt-81532"));
//! assert!(seen.is_duplicate("evt-81532"));
//!
//! // ...and rate-limit per client.
//! let rates = SlidingWindowStore::new(Duration::from_secs(60), 6, 10_000);
//! rates.increment("client-7");
//! assert_eq!(rates.count("client-7"), 1);
//! ```

/// Pluggable time source for TTL and window rotation.
pub mod clock;

/// Doubly linked list with in-place splicing. Internal infrastructure
/// for the recency-ordered caches; not part of the public API.
pub(crate) mod list;

/// Statistics snapshot types shared by the caches.
pub mod stats;

/// Least Recently Used cache with lazy TTL.
pub mod lru;

/// Least Frequently Used cache with per-frequency recency tiebreak.
pub mod lfu;

/// Double-hashed Bloom filter.
pub mod bloom;

/// Deduplication caches (Bloom-fronted and exact).
pub mod dedup;

/// TTL cache with a background sweep, and cache-key derivation.
pub mod ttl;

/// Uniform cache contract and the TTL/LFU factory.
pub mod cacher;

/// Indexed min-heap keyed by timestamp.
pub mod heap;

/// Sliding-window event counters.
pub mod window;

/// Sliding-window distinct-value counters.
pub mod unique;

/// Fenwick tree and its time-bucketed layer.
pub mod fenwick;

/// Geospatial hash grid with haversine refinement.
pub mod spatial;

/// Prefix tree for ranked autocomplete.
pub mod trie;

/// Aho–Corasick automaton.
pub mod aho;

/// Pattern-matching front-ends (user-agent detection).
pub mod pattern;

pub use aho::{AhoCorasick, Match};
pub use bloom::BloomFilter;
pub use cacher::{new_cacher, CacheBackend, CachedValue, Cacher, CacherConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dedup::{BloomLru, DeduplicationCache, ExactLru};
pub use fenwick::{FenwickTree, TemporalFenwickTree, TimeBucket};
pub use heap::{HeapEntry, MinHeap};
pub use lfu::{LfuCache, LfuCacheGeneric};
pub use lru::LruCache;
pub use pattern::{DetectionResult, PatternMatcher, UserAgentDetector};
pub use spatial::{haversine_km, SpatialEntry, SpatialHashGrid, UserLocationTracker};
pub use stats::{CacheStats, DedupStats, LruStats};
pub use trie::{Trie, TrieIndex};
pub use ttl::{generate_key, TtlCache};
pub use unique::{UniqueValueCounter, UniqueValueStore};
pub use window::{SlidingWindowCounter, SlidingWindowStore};
