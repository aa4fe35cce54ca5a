//! In-memory blob cache
//!
//! Holds resolved documents, stamp images, and stamped outputs so tool
//! calls can chain on a `cache_key` instead of re-uploading bytes.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

struct CacheInner {
    lru: LruCache<String, Vec<u8>>,
    total_bytes: usize,
}

/// LRU blob cache bounded by entry count and total byte budget.
pub struct CacheManager {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl CacheManager {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a blob. Entries larger than the whole byte budget are
    /// rejected; otherwise LRU entries are evicted until the budget holds.
    pub fn put(&self, key: String, data: Vec<u8>) {
        let new_size = data.len();
        if new_size > self.max_bytes {
            return;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.len());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            if let Some((_evicted_key, evicted_val)) = inner.lru.pop_lru() {
                inner.total_bytes = inner.total_bytes.saturating_sub(evicted_val.len());
            } else {
                break;
            }
        }

        inner.total_bytes += new_size;
        inner.lru.put(key, data);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock();
        if let Some(val) = inner.lru.pop(key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(val.len());
            Some(val)
        } else {
            None
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Generate a new cache key that is guaranteed not to collide with
    /// existing keys.
    pub fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
