//! TTL + LRU cache for query results.
//!
//! Entries are keyed by a caller-supplied cache key that must
//! deterministically encode the query's identity (the cache performs no
//! validation that a key matches its query - collisions are the caller's
//! problem). Each entry is tagged with the collection it came from so a
//! write to that collection can invalidate every dependent entry.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use crate::model::Document;

/// Default time-to-live for cached query results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached queries.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

// =============================================================================
// CacheEntry
// =============================================================================

struct CacheEntry {
    documents: Vec<Document>,
    collection: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

// =============================================================================
// QueryCache
// =============================================================================

/// A bounded, TTL-checked cache of query results.
///
/// All operations are single-key atomic under one internal lock. There is
/// no cross-key coordination: concurrent invalidation and population of
/// the same key resolve as last-write-wins.
pub struct QueryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    default_ttl: Duration,
}

impl QueryCache {
    /// Create a cache with the default capacity and TTL.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    /// Create a cache with explicit capacity and default TTL.
    pub fn with_settings(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    /// The TTL used when none is given at insertion.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up `key`, returning the cached documents when present and
    /// fresh. Expired entries are evicted on the spot.
    pub fn get(&self, key: &str) -> Option<Vec<Document>> {
        let mut entries = self.entries.lock().unwrap();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(Instant::now()),
            None => return None,
        };
        if expired {
            entries.pop(key);
            debug!(key, "cache entry expired");
            return None;
        }
        entries.get(key).map(|e| e.documents.clone())
    }

    /// Store `documents` under `key`, tagged with the collection it was
    /// queried from, using the default TTL.
    pub fn put(&self, key: &str, collection: &str, documents: Vec<Document>) {
        self.put_with_ttl(key, collection, documents, self.default_ttl);
    }

    /// Store with an explicit TTL. A zero TTL stores nothing: every
    /// subsequent lookup is a miss.
    pub fn put_with_ttl(
        &self,
        key: &str,
        collection: &str,
        documents: Vec<Document>,
        ttl: Duration,
    ) {
        if ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        entries.put(
            key.to_string(),
            CacheEntry {
                documents,
                collection: collection.to_string(),
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop every entry tagged with `collection`. Returns how many entries
    /// were removed.
    pub fn invalidate_collection(&self, collection: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.collection == collection)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        if !stale.is_empty() {
            debug!(collection, removed = stale.len(), "invalidated cache entries");
        }
        stale.len()
    }

    /// Drop one entry by key.
    pub fn invalidate_key(&self, key: &str) -> bool {
        self.entries.lock().unwrap().pop(key).is_some()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Number of live entries (including not-yet-evicted expired ones).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentRef;
    use serde_json::json;

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| {
                Document::new(
                    DocumentRef::new("items", format!("i{i}")),
                    json!({"n": i}),
                )
            })
            .collect()
    }

    #[test]
    fn test_hit_after_put() {
        let cache = QueryCache::new();
        cache.put("items:u1:fav", "items", docs(3));

        let hit = cache.get("items:u1:fav").unwrap();
        assert_eq!(hit.len(), 3);
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = QueryCache::new();
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = QueryCache::new();
        cache.put_with_ttl("k", "items", docs(1), Duration::ZERO);
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let cache = QueryCache::new();
        cache.put_with_ttl("k", "items", docs(1), Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_invalidate_collection_removes_only_matching_tags() {
        let cache = QueryCache::new();
        cache.put("items:a", "items", docs(1));
        cache.put("items:b", "items", docs(2));
        cache.put("collections:a", "collections", docs(1));

        let removed = cache.invalidate_collection("items");
        assert_eq!(removed, 2);
        assert!(cache.get("items:a").is_none());
        assert!(cache.get("items:b").is_none());
        assert!(cache.get("collections:a").is_some());
    }

    #[test]
    fn test_lru_bound_evicts_oldest() {
        let cache = QueryCache::with_settings(2, DEFAULT_CACHE_TTL);
        cache.put("a", "items", docs(1));
        cache.put("b", "items", docs(1));
        cache.put("c", "items", docs(1));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_last_write_wins_on_same_key() {
        let cache = QueryCache::new();
        cache.put("k", "items", docs(1));
        cache.put("k", "items", docs(5));
        assert_eq!(cache.get("k").unwrap().len(), 5);
    }
}
