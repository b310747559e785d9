//! TTL cache with lazy expiry and a periodic background sweep.
//!
//! An unbounded string-keyed map where every entry expires after a TTL
//! (the cache default, or per-entry via [`TtlCache::set_with_ttl`]).
//! Expired entries are removed lazily on [`TtlCache::get`]; a sweeper
//! thread deletes the rest every [`SWEEP_INTERVAL`] so abandoned keys do
//! not pile up. There is no capacity bound: TTL is the eviction policy.
//!
//! # Locking
//!
//! The map is behind a `RwLock`; `get` takes an upgradable read and only
//! upgrades to a write when it finds an expired entry to delete. The
//! statistics counters live behind their own lock so snapshot reads never
//! contend with the data path.
//!
//! # Shutdown
//!
//! The sweeper parks on a condvar with a timeout, so [`TtlCache::stop`]
//! (called automatically on drop) wakes and joins it immediately.

use crate::cacher::CachedValue;
use crate::clock::{default_clock, Clock};
use crate::lru::DEFAULT_TTL;
use crate::stats::CacheStats;
use chrono::Utc;
use core::fmt;
use hashbrown::HashMap;
use log::debug;
use parking_lot::{Condvar, Mutex, RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Interval between background sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct TtlEntry {
    value: CachedValue,
    expires_at: Instant,
}

#[derive(Default)]
struct TtlCounters {
    hits: u64,
    misses: u64,
    evictions: u64,
    last_cleanup: Option<chrono::DateTime<Utc>>,
}

struct TtlShared {
    map: RwLock<HashMap<String, TtlEntry>>,
    counters: RwLock<TtlCounters>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    stop_flag: Mutex<bool>,
    stop_signal: Condvar,
}

impl TtlShared {
    /// Deletes every expired entry; returns the count.
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.map.write();
        let before = map.len();
        map.retain(|_, entry| now <= entry.expires_at);
        let removed = before - map.len();
        drop(map);
        let mut counters = self.counters.write();
        counters.evictions += removed as u64;
        counters.last_cleanup = Some(Utc::now());
        removed
    }
}

/// String-keyed cache of untyped values with per-entry TTL.
///
/// # Example
///
/// ```
/// use cachekit::ttl::TtlCache;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let cache = TtlCache::new(Duration::from_secs(60));
/// cache.set("report", Arc::new(vec![1_u32, 2, 3]));
/// let value = cache.get("report").unwrap();
/// assert_eq!(value.downcast_ref::<Vec<u32>>(), Some(&vec![1, 2, 3]));
/// ```
pub struct TtlCache {
    shared: Arc<TtlShared>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl TtlCache {
    /// Creates a cache whose entries live for `default_ttl` (zero falls
    /// back to [`DEFAULT_TTL`](crate::lru::DEFAULT_TTL)) and starts the
    /// background sweeper.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, default_clock())
    }

    /// Like [`TtlCache::new`] with an explicit time source.
    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let default_ttl = if default_ttl.is_zero() { DEFAULT_TTL } else { default_ttl };
        let shared = Arc::new(TtlShared {
            map: RwLock::new(HashMap::new()),
            counters: RwLock::new(TtlCounters::default()),
            default_ttl,
            clock,
            stop_flag: Mutex::new(false),
            stop_signal: Condvar::new(),
        });
        let sweeper_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("ttl-cache-sweeper".to_owned())
            .spawn(move || loop {
                {
                    let mut stopped = sweeper_shared.stop_flag.lock();
                    if !*stopped {
                        let _ = sweeper_shared
                            .stop_signal
                            .wait_for(&mut stopped, SWEEP_INTERVAL);
                    }
                    if *stopped {
                        return;
                    }
                }
                let removed = sweeper_shared.sweep();
                debug!("ttl cache sweep removed {removed} expired entries");
            })
            .ok();
        TtlCache {
            shared,
            sweeper: Mutex::new(handle),
        }
    }

    /// Inserts with the default TTL, overwriting any previous entry.
    pub fn set(&self, key: &str, value: CachedValue) {
        self.set_with_ttl(key, value, self.shared.default_ttl);
    }

    /// Inserts with an explicit TTL (zero falls back to the default).
    pub fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration) {
        let ttl = if ttl.is_zero() { self.shared.default_ttl } else { ttl };
        let expires_at = self.shared.clock.now() + ttl;
        self.shared
            .map
            .write()
            .insert(key.to_owned(), TtlEntry { value, expires_at });
    }

    /// Looks up a live entry. An expired entry is deleted on the spot and
    /// counted as both a miss and an eviction.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = self.shared.clock.now();
        let map = self.shared.map.upgradable_read();
        let found = map
            .get(key)
            .map(|entry| (now > entry.expires_at, entry.value.clone()));
        match found {
            None => {
                drop(map);
                self.shared.counters.write().misses += 1;
                None
            }
            Some((true, _)) => {
                // Expired: upgrade the read to delete in place.
                let mut map = RwLockUpgradableReadGuard::upgrade(map);
                map.remove(key);
                drop(map);
                let mut counters = self.shared.counters.write();
                counters.misses += 1;
                counters.evictions += 1;
                None
            }
            Some((false, value)) => {
                drop(map);
                self.shared.counters.write().hits += 1;
                Some(value)
            }
        }
    }

    /// Removes the key, counting an eviction whether or not it was
    /// present. Returns whether it was.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.shared.map.write().remove(key).is_some();
        self.shared.counters.write().evictions += 1;
        removed
    }

    /// Drops every entry, adding the previous size to the eviction count.
    pub fn clear(&self) {
        let mut map = self.shared.map.write();
        let dropped = map.len();
        map.clear();
        drop(map);
        self.shared.counters.write().evictions += dropped as u64;
    }

    /// Runs one sweep immediately; returns how many entries it removed.
    pub fn cleanup_now(&self) -> usize {
        self.shared.sweep()
    }

    /// Snapshot of the statistics. The returned value is a copy; mutating
    /// it does not affect later snapshots.
    pub fn stats(&self) -> CacheStats {
        let counters = self.shared.counters.read();
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            total_keys: self.shared.map.read().len() as u64,
            last_cleanup: counters.last_cleanup,
        }
    }

    /// Hit rate in percent.
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }

    /// Current number of entries, expired-but-uncollected included.
    pub fn len(&self) -> usize {
        self.shared.map.read().len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops and joins the background sweeper. Idempotent; the cache
    /// remains usable afterwards with lazy expiry only.
    pub fn stop(&self) {
        {
            let mut stopped = self.shared.stop_flag.lock();
            *stopped = true;
            self.shared.stop_signal.notify_all();
        }
        if let Some(handle) = self.sweeper.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TtlCache {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("default_ttl", &self.shared.default_ttl)
            .field("len", &self.len())
            .finish()
    }
}

/// Derives a deterministic cache key from a method name and its
/// parameters: `method + ":" + hex(SHA-256(canonical JSON)[..16])`.
///
/// Equal logical parameters always produce equal keys: the parameters are
/// serialized through [`serde_json::Value`], whose object keys are
/// sorted. If serialization fails, the key falls back to the parameters'
/// `Debug` form, which is still deterministic for a given type.
///
/// # Example
///
/// ```
/// use cachekit::ttl::generate_key;
/// use serde::Serialize;
///
/// #[derive(Serialize, Debug)]
/// struct Params<'a> {
///     user: &'a str,
///     days: u32,
/// }
///
/// let a = generate_key("top_media", &Params { user: "u1", days: 30 });
/// let b = generate_key("top_media", &Params { user: "u1", days: 30 });
/// assert_eq!(a, b);
/// assert!(a.starts_with("top_media:"));
/// ```
pub fn generate_key<P: Serialize + fmt::Debug>(method: &str, params: &P) -> String {
    let bytes = serde_json::to_value(params)
        .ok()
        .and_then(|value| serde_json::to_vec(&value).ok());
    match bytes {
        Some(bytes) => {
            let digest = Sha256::digest(&bytes);
            format!("{}:{}", method, hex::encode(&digest[..16]))
        }
        None => format!("{method}:{params:?}"),
    }
}
