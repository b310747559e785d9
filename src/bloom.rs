//! Double-hashed Bloom filter.
//!
//! Probabilistic set membership with no false negatives and a configured
//! false-positive rate. The bit array is sized from the expected item
//! count and target rate:
//!
//! ```text
//! m = ⌈−n·ln(p) / (ln 2)²⌉   rounded up to a multiple of 64 (floor 64)
//! k = ⌊(m/n)·ln 2⌋           clamped to [1, 10]
//! ```
//!
//! The k probe positions come from double hashing two FNV-1a variants of
//! the key (`h_i = h1 + i·h2`); the second variant appends a salt byte so
//! the two hashes are independent. `ln(p)` is read from a small table of
//! common rates, so the computed m and k are approximations of the
//! textbook values.
//!
//! There is no deletion: bits only accumulate until [`BloomFilter::clear`].
//!
//! # Thread safety
//!
//! `RwLock`: [`BloomFilter::test`] and the snapshots take the read lock;
//! [`BloomFilter::add`], [`BloomFilter::add_and_test`] and
//! [`BloomFilter::clear`] take the write lock.

use core::fmt;
use parking_lot::RwLock;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Salt byte appended to the key for the second hash.
const H2_SALT: u8 = 0x9e;

/// ln(p) for common false-positive rates. The nearest rate wins; exact
/// array sizing is not a goal.
const LN_P_TABLE: &[(f64, f64)] = &[
    (0.001, -6.907_755),
    (0.005, -5.298_317),
    (0.01, -4.605_170),
    (0.02, -3.912_023),
    (0.05, -2.995_732),
    (0.1, -2.302_585),
    (0.2, -1.609_438),
];

const LN2: f64 = core::f64::consts::LN_2;

fn fnv1a(key: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn fnv1a_salted(key: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash ^= u64::from(H2_SALT);
    hash.wrapping_mul(FNV_PRIME)
}

fn lookup_ln_p(rate: f64) -> f64 {
    let mut best = LN_P_TABLE[0];
    for &(p, ln) in LN_P_TABLE {
        if (rate - p).abs() < (rate - best.0).abs() {
            best = (p, ln);
        }
    }
    best.1
}

struct BloomCore {
    bits: Vec<u64>,
    /// Number of bits (a multiple of 64).
    m: u64,
    /// Number of probe positions per key.
    k: u32,
    /// Keys added since construction or the last clear. Informational
    /// only; membership comes from the bits.
    count: u64,
}

impl BloomCore {
    fn positions(&self, key: &str) -> impl Iterator<Item = u64> + '_ {
        let h1 = fnv1a(key);
        let h2 = fnv1a_salted(key);
        let m = self.m;
        (0..u64::from(self.k)).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % m)
    }

    fn set_bit(&mut self, pos: u64) {
        self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
    }

    fn bit(&self, pos: u64) -> bool {
        self.bits[(pos / 64) as usize] & (1 << (pos % 64)) != 0
    }

    fn test(&self, key: &str) -> bool {
        self.positions(key).all(|pos| self.bit(pos))
    }

    fn add(&mut self, key: &str) {
        let h1 = fnv1a(key);
        let h2 = fnv1a_salted(key);
        for i in 0..u64::from(self.k) {
            self.set_bit(h1.wrapping_add(i.wrapping_mul(h2)) % self.m);
        }
        self.count += 1;
    }
}

/// Probabilistic set with no false negatives.
///
/// # Example
///
/// ```
/// use cachekit::bloom::BloomFilter;
///
/// let filter = BloomFilter::new(1000, 0.01);
/// filter.add("session-42");
/// assert!(filter.test("session-42"));
/// ```
pub struct BloomFilter {
    inner: RwLock<BloomCore>,
}

impl BloomFilter {
    /// Creates a filter sized for `expected_items` at the target
    /// `false_positive_rate`.
    ///
    /// `expected_items` is clamped to at least 1; a rate outside (0, 1)
    /// falls back to 0.01.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1);
        let rate = if false_positive_rate > 0.0 && false_positive_rate < 1.0 {
            false_positive_rate
        } else {
            0.01
        };
        let ln_p = lookup_ln_p(rate);
        let m_raw = (-(n as f64) * ln_p / (LN2 * LN2)).ceil().max(64.0) as u64;
        let m = m_raw.div_ceil(64) * 64;
        let k = ((m as f64 / n as f64) * LN2).floor() as i64;
        let k = k.clamp(1, 10) as u32;
        BloomFilter {
            inner: RwLock::new(BloomCore {
                bits: vec![0; (m / 64) as usize],
                m,
                k,
                count: 0,
            }),
        }
    }

    /// Records the key.
    pub fn add(&self, key: &str) {
        self.inner.write().add(key);
    }

    /// Tests membership. False means definitely never added; true means
    /// added or a false positive.
    pub fn test(&self, key: &str) -> bool {
        self.inner.read().test(key)
    }

    /// Atomic test-then-add under one lock acquisition. Returns the test
    /// result from before the add (true iff the key was already present,
    /// modulo false positives).
    pub fn add_and_test(&self, key: &str) -> bool {
        let mut core = self.inner.write();
        let present = core.test(key);
        core.add(key);
        present
    }

    /// Resets every bit and the add counter.
    pub fn clear(&self) {
        let mut core = self.inner.write();
        core.bits.fill(0);
        core.count = 0;
    }

    /// Number of keys added since construction or the last clear. Not
    /// authoritative for membership.
    pub fn count(&self) -> u64 {
        self.inner.read().count
    }

    /// Size of the bit array in bits.
    pub fn capacity(&self) -> u64 {
        self.inner.read().m
    }

    /// Fraction of bits currently set, in [0, 1].
    pub fn approximate_fill_ratio(&self) -> f64 {
        let core = self.inner.read();
        let ones: u64 = core.bits.iter().map(|w| u64::from(w.count_ones())).sum();
        ones as f64 / core.m as f64
    }
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.read();
        f.debug_struct("BloomFilter")
            .field("bits", &core.m)
            .field("hashes", &core.k)
            .field("count", &core.count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let filter = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            filter.add(&format!("item-{i}"));
        }
        for i in 0..1000 {
            assert!(filter.test(&format!("item-{i}")), "item-{i} lost");
        }
        assert_eq!(filter.count(), 1000);
    }

    #[test]
    fn test_sizing_is_multiple_of_64_with_floor() {
        let tiny = BloomFilter::new(1, 0.01);
        assert!(tiny.capacity() >= 64);
        let filter = BloomFilter::new(1000, 0.01);
        assert_eq!(filter.capacity() % 64, 0);
        // ~9.6 bits per item for p = 0.01.
        assert!(filter.capacity() > 8 * 1000);
    }

    #[test]
    fn test_invalid_rate_falls_back() {
        let a = BloomFilter::new(1000, 0.0);
        let b = BloomFilter::new(1000, 0.01);
        assert_eq!(a.capacity(), b.capacity());
        let c = BloomFilter::new(1000, 1.5);
        assert_eq!(c.capacity(), b.capacity());
    }

    #[test]
    fn test_add_and_test_reports_prior_state() {
        let filter = BloomFilter::new(100, 0.01);
        assert!(!filter.add_and_test("k"));
        assert!(filter.add_and_test("k"));
    }

    #[test]
    fn test_clear_resets() {
        let filter = BloomFilter::new(100, 0.01);
        filter.add("k");
        assert!(filter.test("k"));
        assert!(filter.approximate_fill_ratio() > 0.0);
        filter.clear();
        assert!(!filter.test("k"));
        assert_eq!(filter.count(), 0);
        assert_eq!(filter.approximate_fill_ratio(), 0.0);
    }

    #[test]
    fn test_fill_ratio_grows() {
        let filter = BloomFilter::new(100, 0.01);
        let before = filter.approximate_fill_ratio();
        for i in 0..50 {
            filter.add(&format!("key-{i}"));
        }
        assert!(filter.approximate_fill_ratio() > before);
        assert!(filter.approximate_fill_ratio() <= 1.0);
    }

    #[test]
    fn test_double_hashes_differ() {
        assert_ne!(fnv1a("abc"), fnv1a_salted("abc"));
        assert_ne!(fnv1a("abc"), fnv1a("abd"));
    }

    #[test]
    fn test_concurrent_add_test() {
        use std::sync::Arc;
        use std::thread;

        let filter = Arc::new(BloomFilter::new(10_000, 0.01));
        let mut handles = Vec::new();
        for t in 0..4 {
            let filter = Arc::clone(&filter);
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    let key = format!("key-{t}-{i}");
                    filter.add(&key);
                    assert!(filter.test(&key));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(filter.count(), 4000);
    }
}
