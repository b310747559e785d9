//! Fenwick tree (binary indexed tree) and its time-bucketed layer.
//!
//! [`FenwickTree`] maintains point-updatable prefix sums in O(log n):
//! the classic 1-indexed array where index `i` covers the `i & -i`
//! preceding positions, climbing with `i += i & -i` on update and
//! descending with `i -= i & -i` on query.
//!
//! [`TemporalFenwickTree`] maps absolute timestamps onto the tree's
//! buckets — "plays per 5-minute slot over the last day" — and answers
//! range sums between two timestamps. Out-of-range indices and times are
//! clamped: updates outside the array are dropped, queries clamp to the
//! covered interval and return 0 when nothing overlaps.
//!
//! # Thread safety
//!
//! `RwLock`: updates and clears are exclusive, sums and reads are shared.

use chrono::{DateTime, TimeDelta, Utc};
use core::fmt;
use parking_lot::RwLock;
use serde::Serialize;
use std::time::Duration;

/// Bucket width substituted when a constructor receives a zero duration.
const DEFAULT_BUCKET_SIZE: Duration = Duration::from_secs(60);

struct FenwickCore {
    /// 1-indexed; slot 0 is unused.
    tree: Vec<i64>,
    n: usize,
}

impl FenwickCore {
    fn update(&mut self, index: usize, delta: i64) {
        if index >= self.n {
            return;
        }
        let mut i = index + 1;
        while i <= self.n {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// Sum of positions `0..=index`, clamped to the array.
    fn prefix_sum(&self, index: usize) -> i64 {
        if self.n == 0 {
            return 0;
        }
        let mut i = index.min(self.n - 1) + 1;
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    fn range_sum(&self, left: usize, right: usize) -> i64 {
        if self.n == 0 || left >= self.n || left > right {
            return 0;
        }
        let right = right.min(self.n - 1);
        let high = self.prefix_sum(right);
        if left == 0 {
            high
        } else {
            high - self.prefix_sum(left - 1)
        }
    }
}

/// Thread-safe binary indexed tree over `n` positions.
///
/// # Example
///
/// ```
/// use cachekit::fenwick::FenwickTree;
///
/// let tree = FenwickTree::new(5);
/// for (i, v) in [1, 2, 3, 4, 5].into_iter().enumerate() {
///     tree.update(i, v);
/// }
/// assert_eq!(tree.prefix_sum(3), 10);
/// assert_eq!(tree.range_sum(1, 3), 9);
/// ```
pub struct FenwickTree {
    core: RwLock<FenwickCore>,
}

impl FenwickTree {
    /// Creates a tree over positions `0..n` (all zero).
    pub fn new(n: usize) -> Self {
        FenwickTree {
            core: RwLock::new(FenwickCore {
                tree: vec![0; n + 1],
                n,
            }),
        }
    }

    /// Adds `delta` at `index`. Out-of-range indices are ignored.
    pub fn update(&self, index: usize, delta: i64) {
        self.core.write().update(index, delta);
    }

    /// Sum of positions `0..=index`, clamped to the array; 0 when empty.
    pub fn prefix_sum(&self, index: usize) -> i64 {
        self.core.read().prefix_sum(index)
    }

    /// Sum of positions `left..=right`, clamped on the right; 0 when the
    /// range misses the array entirely.
    pub fn range_sum(&self, left: usize, right: usize) -> i64 {
        self.core.read().range_sum(left, right)
    }

    /// Value at a single position; 0 out of range.
    pub fn get(&self, index: usize) -> i64 {
        self.core.read().range_sum(index, index)
    }

    /// Number of positions.
    pub fn size(&self) -> usize {
        self.core.read().n
    }

    /// Sum over every position.
    pub fn total(&self) -> i64 {
        let core = self.core.read();
        if core.n == 0 {
            0
        } else {
            core.prefix_sum(core.n - 1)
        }
    }

    /// Zeroes every position.
    pub fn clear(&self) {
        let mut core = self.core.write();
        core.tree.fill(0);
    }
}

impl fmt::Debug for FenwickTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FenwickTree").field("n", &self.size()).finish()
    }
}

/// One time bucket of a [`TemporalFenwickTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    /// Inclusive bucket start.
    pub start: DateTime<Utc>,
    /// Exclusive bucket end (`start + bucket_size`).
    pub end: DateTime<Utc>,
    /// Sum accumulated in the bucket.
    pub count: i64,
}

/// Fenwick tree indexed by absolute time.
///
/// Covers `[start_time, end_time]` divided into fixed-width buckets;
/// timestamps map to bucket `⌊(t − start) / bucket_size⌋`, clamped to the
/// covered range.
pub struct TemporalFenwickTree {
    tree: FenwickTree,
    start_time: DateTime<Utc>,
    bucket_nanos: i64,
    num_buckets: usize,
}

impl TemporalFenwickTree {
    /// Creates a tree covering `[start_time, end_time]` with
    /// `bucket_size`-wide buckets (zero falls back to one minute). An
    /// empty or inverted range still gets one bucket.
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, bucket_size: Duration) -> Self {
        let bucket_size = if bucket_size.is_zero() { DEFAULT_BUCKET_SIZE } else { bucket_size };
        let bucket_nanos = i64::try_from(bucket_size.as_nanos()).unwrap_or(i64::MAX).max(1);
        let span_nanos = (end_time - start_time).num_nanoseconds().unwrap_or(0).max(0);
        let num_buckets = (span_nanos / bucket_nanos) as usize + 1;
        TemporalFenwickTree {
            tree: FenwickTree::new(num_buckets),
            start_time,
            bucket_nanos,
            num_buckets,
        }
    }

    fn time_to_index(&self, t: DateTime<Utc>) -> usize {
        let offset = (t - self.start_time).num_nanoseconds().unwrap_or(0);
        if offset <= 0 {
            return 0;
        }
        ((offset / self.bucket_nanos) as usize).min(self.num_buckets - 1)
    }

    fn bucket_start(&self, index: usize) -> DateTime<Utc> {
        self.start_time + TimeDelta::nanoseconds(self.bucket_nanos * index as i64)
    }

    /// Adds `delta` to the bucket containing `t` (clamped to the range).
    pub fn add(&self, t: DateTime<Utc>, delta: i64) {
        self.tree.update(self.time_to_index(t), delta);
    }

    /// Sum in the bucket containing `t`.
    pub fn get_count(&self, t: DateTime<Utc>) -> i64 {
        self.tree.get(self.time_to_index(t))
    }

    /// Sum over the buckets containing `from` through `until`, inclusive.
    pub fn range_sum_time(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
        self.tree
            .range_sum(self.time_to_index(from), self.time_to_index(until))
    }

    /// Every bucket with its time bounds, in time order.
    pub fn buckets(&self) -> Vec<TimeBucket> {
        (0..self.num_buckets)
            .map(|i| {
                let start = self.bucket_start(i);
                TimeBucket {
                    start,
                    end: start + TimeDelta::nanoseconds(self.bucket_nanos),
                    count: self.tree.get(i),
                }
            })
            .collect()
    }

    /// [`TemporalFenwickTree::buckets`] filtered to non-zero counts.
    pub fn non_zero_buckets(&self) -> Vec<TimeBucket> {
        self.buckets().into_iter().filter(|b| b.count != 0).collect()
    }

    /// Number of buckets.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Sum over every bucket.
    pub fn total(&self) -> i64 {
        self.tree.total()
    }

    /// Zeroes every bucket.
    pub fn clear(&self) {
        self.tree.clear();
    }
}

impl fmt::Debug for TemporalFenwickTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporalFenwickTree")
            .field("start_time", &self.start_time)
            .field("num_buckets", &self.num_buckets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_prefix_and_range_sums() {
        let tree = FenwickTree::new(5);
        for (i, v) in [1, 2, 3, 4, 5].into_iter().enumerate() {
            tree.update(i, v);
        }
        assert_eq!(tree.prefix_sum(0), 1);
        assert_eq!(tree.prefix_sum(3), 10);
        assert_eq!(tree.prefix_sum(4), 15);
        assert_eq!(tree.range_sum(1, 3), 9);
        assert_eq!(tree.range_sum(0, 4), 15);
        assert_eq!(tree.range_sum(2, 2), 3);
        assert_eq!(tree.total(), 15);
    }

    #[test]
    fn test_range_sum_matches_naive() {
        let values: Vec<i64> = (0..32).map(|i| (i * 7 + 3) % 11).collect();
        let tree = FenwickTree::new(values.len());
        for (i, v) in values.iter().enumerate() {
            tree.update(i, *v);
        }
        for l in 0..values.len() {
            for r in l..values.len() {
                let naive: i64 = values[l..=r].iter().sum();
                assert_eq!(tree.range_sum(l, r), naive, "range [{l}, {r}]");
            }
        }
    }

    #[test]
    fn test_out_of_range_clamping() {
        let tree = FenwickTree::new(5);
        tree.update(0, 1);
        tree.update(4, 1);
        // Silently ignored.
        tree.update(5, 100);
        tree.update(999, 100);
        assert_eq!(tree.total(), 2);
        // Clamped on the present side.
        assert_eq!(tree.prefix_sum(999), 2);
        assert_eq!(tree.range_sum(0, 999), 2);
        // Entirely absent ranges are 0.
        assert_eq!(tree.range_sum(5, 9), 0);
        assert_eq!(tree.get(7), 0);
    }

    #[test]
    fn test_empty_tree_is_all_zero() {
        let tree = FenwickTree::new(0);
        tree.update(0, 5);
        assert_eq!(tree.prefix_sum(0), 0);
        assert_eq!(tree.range_sum(0, 10), 0);
        assert_eq!(tree.total(), 0);
        assert_eq!(tree.size(), 0);
    }

    #[test]
    fn test_negative_deltas_and_clear() {
        let tree = FenwickTree::new(4);
        tree.update(1, 10);
        tree.update(1, -4);
        assert_eq!(tree.get(1), 6);
        tree.clear();
        assert_eq!(tree.total(), 0);
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn test_temporal_bucketing() {
        // One hour in 10-minute buckets: 7 buckets (inclusive range).
        let tree = TemporalFenwickTree::new(ts(0), ts(3600), Duration::from_secs(600));
        assert_eq!(tree.num_buckets(), 7);
        tree.add(ts(0), 1);
        tree.add(ts(599), 1);
        tree.add(ts(600), 2);
        tree.add(ts(1800), 5);
        assert_eq!(tree.get_count(ts(30)), 2);
        assert_eq!(tree.get_count(ts(700)), 2);
        assert_eq!(tree.get_count(ts(1801)), 5);
        assert_eq!(tree.total(), 9);
    }

    #[test]
    fn test_temporal_range_sum_is_inclusive() {
        let tree = TemporalFenwickTree::new(ts(0), ts(3600), Duration::from_secs(600));
        tree.add(ts(0), 1);
        tree.add(ts(600), 2);
        tree.add(ts(1200), 4);
        // Buckets 0 and 1 in full, bucket 2 included by its start time.
        assert_eq!(tree.range_sum_time(ts(0), ts(1200)), 7);
        assert_eq!(tree.range_sum_time(ts(0), ts(1199)), 3);
        assert_eq!(tree.range_sum_time(ts(600), ts(600)), 2);
    }

    #[test]
    fn test_temporal_clamps_out_of_range_times() {
        let tree = TemporalFenwickTree::new(ts(1000), ts(2000), Duration::from_secs(100));
        // Before the range: lands in bucket 0.
        tree.add(ts(500), 1);
        // After the range: lands in the last bucket.
        tree.add(ts(9999), 1);
        assert_eq!(tree.get_count(ts(1000)), 1);
        assert_eq!(tree.get_count(ts(2000)), 1);
        assert_eq!(tree.total(), 2);
    }

    #[test]
    fn test_temporal_buckets_enumeration() {
        let tree = TemporalFenwickTree::new(ts(0), ts(1800), Duration::from_secs(600));
        tree.add(ts(700), 3);
        let buckets = tree.buckets();
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].start, ts(0));
        assert_eq!(buckets[0].end, ts(600));
        assert_eq!(buckets[1].count, 3);
        let non_zero = tree.non_zero_buckets();
        assert_eq!(non_zero.len(), 1);
        assert_eq!(non_zero[0].start, ts(600));
    }

    #[test]
    fn test_temporal_inverted_range_still_works() {
        let tree = TemporalFenwickTree::new(ts(1000), ts(500), Duration::from_secs(60));
        assert_eq!(tree.num_buckets(), 1);
        tree.add(ts(1000), 1);
        assert_eq!(tree.total(), 1);
    }

    #[test]
    fn test_concurrent_updates_sum_correctly() {
        use std::sync::Arc;
        use std::thread;

        let tree = Arc::new(FenwickTree::new(64));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let tree = Arc::clone(&tree);
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    tree.update(i % 64, 1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tree.total(), 4000);
    }
}
