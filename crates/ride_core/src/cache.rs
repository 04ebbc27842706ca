//! TTL caches keyed by quantized coordinates.
//!
//! Entries carry their own expiry; nothing sweeps them. A lookup that finds an
//! expired entry removes it and reports [`CacheLookup::Expired`], which callers
//! treat exactly like a miss. The map is also LRU-bounded so a stream of
//! distinct keys cannot grow it without limit.
//!
//! Time comes from `tokio::time::Instant` so tests can drive expiry with a
//! paused runtime clock.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::geo::{quantize, Coord};

/// Cache-key precision: four decimals, roughly 11 m.
pub const KEY_PRECISION_DECIMALS: u32 = 4;

/// Default upper bound on live entries per cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A cached value with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    /// Entry existed but had expired; it has been removed.
    Expired,
}

impl<T> CacheLookup<T> {
    pub fn into_hit(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            _ => None,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Miss => "miss",
            CacheLookup::Expired => "expired",
        }
    }
}

/// Directional quantized key for a pair of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizedLeg {
    pub from: (i64, i64),
    pub to: (i64, i64),
}

impl QuantizedLeg {
    pub fn new(from: Coord, to: Coord) -> Self {
        Self::with_precision(from, to, KEY_PRECISION_DECIMALS)
    }

    pub fn with_precision(from: Coord, to: Coord, decimals: u32) -> Self {
        Self {
            from: (quantize(from.lat, decimals), quantize(from.lng, decimals)),
            to: (quantize(to.lat, decimals), quantize(to.lng, decimals)),
        }
    }
}

/// Mutex-guarded LRU map whose entries expire after a fixed TTL.
pub struct TtlCache<K: Hash + Eq, V: Clone> {
    ttl: Duration,
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up `key`, evicting it if it has expired.
    pub fn get(&self, key: &K) -> CacheLookup<V> {
        let now = Instant::now();
        let Ok(mut entries) = self.entries.lock() else {
            // Poisoned: behave as an empty cache rather than fail the request.
            return CacheLookup::Miss;
        };
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => CacheLookup::Hit(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                CacheLookup::Expired
            }
            None => CacheLookup::Miss,
        }
    }

    /// Insert or replace `key`, stamping it with `now + ttl`.
    pub fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, entry);
        }
    }

    /// Number of stored entries, expired ones included until looked up.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
