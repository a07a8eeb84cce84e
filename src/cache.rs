//! Resolution cache
//!
//! Bounded memo of `ip -> Resolution`. Eviction is first-in-first-out:
//! lookups never move an entry, and inserting a key that is already
//! present changes nothing. Backed by `lru::LruCache` using only `peek`
//! and `push`, which keeps insertion order intact.

use crate::record::Resolution;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// FIFO-bounded resolution cache
pub struct ResolutionCache {
    entries: Option<Mutex<LruCache<String, Resolution>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResolutionCache {
    /// Create a cache holding at most `capacity` entries; 0 disables it
    pub fn new(capacity: usize) -> Self {
        let entries = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            entries,
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cached resolution for `ip`
    pub fn get(&self, ip: &str) -> Option<Resolution> {
        let found = self
            .entries
            .as_ref()
            .and_then(|entries| entries.lock().peek(ip).cloned());
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Remember a resolution; existing keys keep their value and position
    pub fn put(&self, ip: &str, resolution: Resolution) {
        let Some(entries) = &self.entries else {
            return;
        };
        let mut entries = entries.lock();
        if entries.contains(ip) {
            return;
        }
        if let Some((evicted, _)) = entries.push(ip.to_string(), resolution) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(ip = %evicted, "evicted cached resolution");
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
