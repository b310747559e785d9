//! Indexed binary min-heap keyed by timestamp.
//!
//! A priority queue over `(key, value, timestamp)` entries where the
//! minimum timestamp sits at the root, plus a key → slot index so any
//! entry can be found, updated, or removed in O(log n):
//!
//! ```text
//! entries:  [ 09:00, 09:05, 09:02, 09:30, ... ]    (array heap)
//! by_key:   { "sess-a" → 0, "sess-b" → 2, ... }    (key → slot)
//! ```
//!
//! Swaps during sift-up/sift-down keep `by_key` in lock-step, so
//! `by_key[entry.key]` always names the entry's current slot.
//!
//! Typical use: tracking the oldest active session or the next playback
//! event to expire; [`MinHeap::pop_before`] drains everything older than
//! a cutoff in timestamp order.
//!
//! # Thread safety
//!
//! One `RwLock`: mutations take the write lock, `peek`/`get`/`all`/`len`/
//! `get_before` take the read lock.

use chrono::{DateTime, Utc};
use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;

/// One heap slot: a keyed value ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEntry<T> {
    /// Lookup key, unique within the heap.
    pub key: String,
    /// Caller payload.
    pub value: T,
    /// Ordering key; the heap minimum is the oldest timestamp.
    pub timestamp: DateTime<Utc>,
}

struct HeapCore<T> {
    entries: Vec<HeapEntry<T>>,
    by_key: HashMap<String, usize>,
    /// Entry bound; 0 means unbounded.
    max_len: usize,
}

impl<T> HeapCore<T> {
    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        let key_a = self.entries[a].key.clone();
        let key_b = self.entries[b].key.clone();
        self.by_key.insert(key_a, a);
        self.by_key.insert(key_b, b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.entries[parent].timestamp <= self.entries[i].timestamp {
                break;
            }
            self.swap(parent, i);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < len && self.entries[left].timestamp < self.entries[smallest].timestamp {
                smallest = left;
            }
            if right < len && self.entries[right].timestamp < self.entries[smallest].timestamp {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    /// Restores the heap property around slot `i` after its timestamp
    /// changed in either direction.
    fn fix(&mut self, i: usize) {
        self.sift_up(i);
        self.sift_down(i);
    }

    fn pop_min(&mut self) -> Option<HeapEntry<T>> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let entry = self.entries.pop()?;
        self.by_key.remove(&entry.key);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some(entry)
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let Some(&i) = self.by_key.get(key) else {
            return false;
        };
        let last = self.entries.len() - 1;
        self.swap(i, last);
        let Some(entry) = self.entries.pop() else {
            return false;
        };
        self.by_key.remove(&entry.key);
        if i < self.entries.len() {
            self.fix(i);
        }
        true
    }
}

/// Thread-safe indexed min-heap.
///
/// # Example
///
/// ```
/// use cachekit::heap::MinHeap;
/// use chrono::{TimeZone, Utc};
///
/// let heap: MinHeap<&str> = MinHeap::new(0);
/// heap.push("b", "second", Utc.timestamp_opt(200, 0).unwrap());
/// heap.push("a", "first", Utc.timestamp_opt(100, 0).unwrap());
///
/// assert_eq!(heap.peek().unwrap().key, "a");
/// assert_eq!(heap.pop().unwrap().value, "first");
/// assert_eq!(heap.peek().unwrap().key, "b");
/// ```
pub struct MinHeap<T> {
    core: RwLock<HeapCore<T>>,
}

impl<T: Clone> MinHeap<T> {
    /// Creates a heap holding at most `max_len` entries; 0 means
    /// unbounded. When bounded, an insert that exceeds the bound pops and
    /// returns the minimum.
    pub fn new(max_len: usize) -> Self {
        MinHeap {
            core: RwLock::new(HeapCore {
                entries: Vec::new(),
                by_key: HashMap::new(),
                max_len,
            }),
        }
    }

    /// Inserts, or updates value and timestamp when the key exists.
    /// Returns the evicted minimum if the insert pushed the heap past its
    /// bound.
    pub fn push(&self, key: &str, value: T, timestamp: DateTime<Utc>) -> Option<HeapEntry<T>> {
        let mut core = self.core.write();
        if let Some(&i) = core.by_key.get(key) {
            core.entries[i].value = value;
            core.entries[i].timestamp = timestamp;
            core.fix(i);
            return None;
        }
        let slot = core.entries.len();
        core.entries.push(HeapEntry {
            key: key.to_owned(),
            value,
            timestamp,
        });
        core.by_key.insert(key.to_owned(), slot);
        core.sift_up(slot);
        if core.max_len > 0 && core.entries.len() > core.max_len {
            return core.pop_min();
        }
        None
    }

    /// Removes and returns the minimum-timestamp entry.
    pub fn pop(&self) -> Option<HeapEntry<T>> {
        self.core.write().pop_min()
    }

    /// Returns a copy of the minimum-timestamp entry.
    pub fn peek(&self) -> Option<HeapEntry<T>> {
        self.core.read().entries.first().cloned()
    }

    /// Returns a copy of the entry for `key`.
    pub fn get(&self, key: &str) -> Option<HeapEntry<T>> {
        let core = self.core.read();
        let &i = core.by_key.get(key)?;
        Some(core.entries[i].clone())
    }

    /// Removes the entry for `key`; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.core.write().remove_key(key)
    }

    /// Re-stamps the entry for `key` and rebalances. False when missing.
    pub fn update(&self, key: &str, timestamp: DateTime<Utc>) -> bool {
        let mut core = self.core.write();
        let Some(&i) = core.by_key.get(key) else {
            return false;
        };
        core.entries[i].timestamp = timestamp;
        core.fix(i);
        true
    }

    /// Copies of all entries with `timestamp < cutoff`, in no particular
    /// order. The heap is unchanged.
    pub fn get_before(&self, cutoff: DateTime<Utc>) -> Vec<HeapEntry<T>> {
        self.core
            .read()
            .entries
            .iter()
            .filter(|e| e.timestamp < cutoff)
            .cloned()
            .collect()
    }

    /// Drains all entries with `timestamp < cutoff`, oldest first.
    pub fn pop_before(&self, cutoff: DateTime<Utc>) -> Vec<HeapEntry<T>> {
        let mut core = self.core.write();
        let mut drained = Vec::new();
        while core.entries.first().is_some_and(|e| e.timestamp < cutoff) {
            if let Some(entry) = core.pop_min() {
                drained.push(entry);
            }
        }
        drained
    }

    /// Copies of all entries, in no particular order.
    pub fn all(&self) -> Vec<HeapEntry<T>> {
        self.core.read().entries.clone()
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.core.read().entries.len()
    }

    /// True when the heap holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut core = self.core.write();
        core.entries.clear();
        core.by_key.clear();
    }
}

impl<T> fmt::Debug for MinHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("MinHeap")
            .field("len", &core.entries.len())
            .field("max_len", &core.max_len)
            .finish()
    }
}
