//! Bounded TTL cache for search results
//!
//! LRU eviction bounds memory; a per-entry timestamp bounds staleness.
//! Expired entries are dropped on read. Misses are computed by the caller
//! without coalescing, so concurrent identical queries at a cache boundary
//! may do duplicate work.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::SearchMatch;

struct CachedEntry {
    results: Vec<SearchMatch>,
    inserted_at: Instant,
}

/// Concurrent-safe LRU+TTL cache keyed by request fingerprint
pub struct SearchCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
    ttl: Duration,
}

impl SearchCache {
    /// Create a cache holding up to `capacity` entries for up to `ttl` each.
    /// A zero capacity is clamped to one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up cached results, dropping the entry if its TTL elapsed.
    pub fn get(&self, key: &str) -> Option<Vec<SearchMatch>> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                Some(entry.results.clone())
            }
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Insert results for a key, evicting the least-recently-used entry when
    /// the cache is full.
    pub fn put(&self, key: String, results: Vec<SearchMatch>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                CachedEntry {
                    results,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Current entry count (expired entries included until touched).
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
