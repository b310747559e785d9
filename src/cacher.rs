//! Uniform cache contract and factory.
//!
//! Higher layers cache responses through one interface, [`Cacher`], and
//! choose an eviction strategy by configuration alone:
//!
//! - [`CacheBackend::Ttl`] — unbounded, entries expire after a TTL
//!   ([`TtlCache`]). The default: response caches are naturally bounded
//!   by their key space.
//! - [`CacheBackend::Lfu`] — bounded, least-frequently-used eviction with
//!   the same TTL semantics ([`LfuCache`]). For hot-key workloads that
//!   must cap memory.
//!
//! Variants share no implementation; the factory is the only coupling.
//!
//! # Example
//!
//! ```
//! use cachekit::cacher::{new_cacher, CacheBackend, CacherConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let cache = new_cacher(CacherConfig {
//!     backend: CacheBackend::Lfu,
//!     ttl: Duration::from_secs(60),
//!     capacity: 1000,
//! });
//! cache.set("summary", Arc::new(String::from("ready")));
//! assert!(cache.get("summary").is_some());
//! assert_eq!(cache.stats().hits, 1);
//! ```

use crate::lfu::LfuCache;
use crate::lru::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::stats::CacheStats;
use crate::ttl::TtlCache;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Untyped cached value. Stored behind `Arc` so gets are cheap clones;
/// callers downcast to the concrete type they stored.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Capability set shared by every cache the factory can build.
pub trait Cacher: Send + Sync {
    /// Looks up a live entry.
    fn get(&self, key: &str) -> Option<CachedValue>;
    /// Inserts with the configured default TTL.
    fn set(&self, key: &str, value: CachedValue);
    /// Inserts with an explicit TTL.
    fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration);
    /// Removes the key; returns whether it was present.
    fn delete(&self, key: &str) -> bool;
    /// Drops every entry.
    fn clear(&self);
    /// Counter snapshot.
    fn stats(&self) -> CacheStats;
    /// Hit rate in percent.
    fn hit_rate(&self) -> f64;
}

/// Which cache implementation the factory builds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Unbounded TTL cache with a background sweep.
    #[default]
    Ttl,
    /// Capacity-bounded LFU cache with lazy TTL.
    Lfu,
}

/// Factory configuration.
///
/// Zero values select the documented defaults: 5 minute TTL, 10 000
/// entry capacity for the LFU backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacherConfig {
    /// Backend selection.
    pub backend: CacheBackend,
    /// Default TTL applied by [`Cacher::set`].
    pub ttl: Duration,
    /// Entry bound for [`CacheBackend::Lfu`]; ignored by the TTL backend.
    pub capacity: usize,
}

/// Builds a cache for the given configuration.
pub fn new_cacher(config: CacherConfig) -> Box<dyn Cacher> {
    let ttl = if config.ttl.is_zero() { DEFAULT_TTL } else { config.ttl };
    match config.backend {
        CacheBackend::Ttl => Box::new(TtlCache::new(ttl)),
        CacheBackend::Lfu => {
            let capacity = if config.capacity == 0 { DEFAULT_CAPACITY } else { config.capacity };
            Box::new(LfuCacher {
                inner: LfuCache::new(capacity, ttl),
            })
        }
    }
}

impl Cacher for TtlCache {
    fn get(&self, key: &str) -> Option<CachedValue> {
        TtlCache::get(self, key)
    }

    fn set(&self, key: &str, value: CachedValue) {
        TtlCache::set(self, key, value);
    }

    fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration) {
        TtlCache::set_with_ttl(self, key, value, ttl);
    }

    fn delete(&self, key: &str) -> bool {
        TtlCache::delete(self, key)
    }

    fn clear(&self) {
        TtlCache::clear(self);
    }

    fn stats(&self) -> CacheStats {
        TtlCache::stats(self)
    }

    fn hit_rate(&self) -> f64 {
        TtlCache::hit_rate(self)
    }
}

/// [`Cacher`] adapter over the LFU cache.
struct LfuCacher {
    inner: LfuCache,
}

impl Cacher for LfuCacher {
    fn get(&self, key: &str) -> Option<CachedValue> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: CachedValue) {
        self.inner.set(key, value);
    }

    fn set_with_ttl(&self, key: &str, value: CachedValue, ttl: Duration) {
        self.inner.set_with_ttl(key, value, ttl);
    }

    fn delete(&self, key: &str) -> bool {
        self.inner.remove(key)
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    fn hit_rate(&self) -> f64 {
        self.inner.hit_rate()
    }
}

impl fmt::Debug for LfuCacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuCacher").field("inner", &self.inner).finish()
    }
}
