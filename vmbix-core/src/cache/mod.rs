//! TTL- and size-bounded caches with hit/miss accounting.
//!
//! Each cache is an LRU map guarded by a `parking_lot::Mutex`; the lock is
//! held only for O(1) map operations, never across a remote call. Entries
//! older than the TTL are never served. Hit/miss counters are cumulative over
//! the process lifetime and survive `invalidate_all`.

mod bank;

pub use bank::{CacheBank, CacheName};

use crate::config::CacheSettings;
use crate::observability::metrics as vmbix_metrics;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Cumulative lookup statistics of one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hits over requests; 1.0 before the first request.
    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 1.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

/// Read-only view used by the status commands, independent of value type.
pub trait CacheView: Send + Sync {
    fn name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn stats(&self) -> CacheStats;
}

/// A keyed cache with a TTL and a maximum entry count.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<LruCache<String, CachedEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache. A `max_entries` of zero disables storage; every lookup
    /// then counts as a miss.
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            ttl,
            max_entries,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_settings(name: &'static str, settings: &CacheSettings) -> Self {
        Self::new(name, settings.ttl(), settings.max_entries)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`. Records a hit or a miss; an expired entry is
    /// dropped and counts as a miss.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let found = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                    Some(entry.value.clone())
                }
                Some(_) => {
                    entries.pop(key);
                    None
                }
                None => None,
            }
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            vmbix_metrics::record_cache_lookup(self.name, true);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            vmbix_metrics::record_cache_lookup(self.name, false);
        }
        found
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Insert as of `now`, evicting the least recently used entry when full.
    pub fn insert_at(&self, key: impl Into<String>, value: V, now: Instant) {
        if self.max_entries == 0 {
            return;
        }
        self.entries.lock().put(key.into(), CachedEntry { value, inserted_at: now });
    }

    /// Drop every entry. Statistics are kept.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    /// Number of unexpired entries as of `now`.
    pub fn len_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.inserted_at) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len_at(Instant::now()) == 0
    }
}

impl<V: Clone + Send> CacheView for TtlCache<V> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn len(&self) -> usize {
        self.len_at(Instant::now())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
