//! Encode-result cache.
//!
//! This module provides a bounded LRU cache for storing recently encoded
//! words, so that repeated words across translation requests are not
//! re-encoded. The cache is shared by every thread serving requests against
//! one model, so all access goes through a single mutex; hits and misses are
//! answered by value and no partially-written entry can ever be observed.

use ahash::AHashMap;
use compact_str::CompactString;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe bounded LRU cache mapping a word to its encoded subwords.
///
/// Purely a performance optimization: a hit must equal what a miss would
/// have computed, and clearing the cache never changes encode results.
pub struct EncodeCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    map: AHashMap<CompactString, Vec<CompactString>>,
    /// Recency order; front = least recently used.
    recency: Vec<CompactString>,
}

impl EncodeCache {
    /// Default number of cached words.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: AHashMap::with_capacity(capacity),
                recency: Vec::with_capacity(capacity),
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // The cache holds no cross-entry invariants a panicked writer could
        // have broken, so a poisoned lock is safe to re-enter.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a word, marking it most recently used on a hit.
    pub fn get(&self, word: &str) -> Option<Vec<CompactString>> {
        let mut inner = self.lock();
        let hit = inner.map.get(word).cloned()?;
        if let Some(pos) = inner.recency.iter().position(|w| w == word) {
            let key = inner.recency.remove(pos);
            inner.recency.push(key);
        }
        Some(hit)
    }

    /// Store an encode result, evicting the least recently used entry once
    /// the cache is full.
    pub fn put(&self, word: &str, subwords: Vec<CompactString>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        if inner.map.contains_key(word) {
            if let Some(pos) = inner.recency.iter().position(|w| w == word) {
                inner.recency.remove(pos);
            }
        } else {
            while inner.map.len() >= self.capacity {
                if inner.recency.is_empty() {
                    break;
                }
                let oldest = inner.recency.remove(0);
                inner.map.remove(&oldest);
            }
        }
        let key = CompactString::new(word);
        inner.recency.push(key.clone());
        inner.map.insert(key, subwords);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.recency.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EncodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subwords(parts: &[&str]) -> Vec<CompactString> {
        parts.iter().map(|p| CompactString::new(p)).collect()
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = EncodeCache::with_capacity(3);
        assert_eq!(cache.get("hello"), None);

        cache.put("hello", subwords(&["hel@@", "lo"]));
        assert_eq!(cache.get("hello"), Some(subwords(&["hel@@", "lo"])));
        assert_eq!(cache.get("world"), None);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = EncodeCache::with_capacity(2);
        cache.put("a", subwords(&["a"]));
        cache.put("b", subwords(&["b"]));
        cache.put("c", subwords(&["c"]));

        // "a" was the oldest entry
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_recency_bump_on_get() {
        let cache = EncodeCache::with_capacity(2);
        cache.put("a", subwords(&["a"]));
        cache.put("b", subwords(&["b"]));

        // touch "a" so "b" becomes the eviction candidate
        cache.get("a");
        cache.put("c", subwords(&["c"]));

        assert!(cache.get("a").is_some());
        assert_eq!(cache.get("b"), None);
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let cache = EncodeCache::with_capacity(2);
        cache.put("a", subwords(&["a"]));
        cache.put("a", subwords(&["a@@", "x"]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(subwords(&["a@@", "x"])));
    }

    #[test]
    fn test_clear() {
        let cache = EncodeCache::new();
        cache.put("a", subwords(&["a"]));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = EncodeCache::with_capacity(0);
        cache.put("a", subwords(&["a"]));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(EncodeCache::with_capacity(64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("word-{}-{}", t, i % 20);
                        cache.put(&key, subwords(&["x@@", "y"]));
                        if let Some(hit) = cache.get(&key) {
                            assert_eq!(hit, subwords(&["x@@", "y"]));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
