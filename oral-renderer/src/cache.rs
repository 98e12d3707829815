//! Bitmap cache.
//!
//! Caches decoded images by source string so repeated paints of the same
//! stamp or background skip loading and decoding and happen synchronously.

use std::collections::HashMap;
use std::sync::Arc;

use oral_canvas_core::CacheLimits;

use crate::bitmap::Bitmap;

/// Entry in the bitmap cache.
#[derive(Debug)]
struct CacheEntry {
    bitmap: Arc<Bitmap>,
    /// Logical access time.
    last_accessed: u64,
    size_bytes: usize,
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of evictions.
    pub evictions: u64,
    /// Total bytes inserted.
    pub bytes_loaded: u64,
}

/// Decoded bitmaps keyed by source, with LRU eviction.
#[derive(Debug)]
pub struct BitmapCache {
    entries: HashMap<String, CacheEntry>,
    limits: CacheLimits,
    current_size: usize,
    clock: u64,
    stats: CacheStats,
}

impl Default for BitmapCache {
    fn default() -> Self {
        Self::new(CacheLimits::default())
    }
}

impl BitmapCache {
    /// Create an empty cache with the given limits.
    #[must_use]
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            entries: HashMap::new(),
            limits,
            current_size: 0,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Get a bitmap from the cache.
    pub fn get(&mut self, key: &str) -> Option<Arc<Bitmap>> {
        let now = self.tick();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_accessed = now;
            self.stats.hits += 1;
            Some(Arc::clone(&entry.bitmap))
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Insert a bitmap, evicting least recently used entries as needed.
    ///
    /// Bitmaps larger than the whole byte budget are not cached.
    pub fn insert(&mut self, key: impl Into<String>, bitmap: Arc<Bitmap>) {
        let key = key.into();
        let size_bytes = bitmap.size_bytes();

        if let Some(old) = self.entries.remove(&key) {
            self.current_size -= old.size_bytes;
        }
        if size_bytes > self.limits.max_bytes || self.limits.max_entries == 0 {
            tracing::debug!("Not caching {size_bytes} byte bitmap");
            return;
        }

        self.evict_if_needed(size_bytes);

        self.current_size += size_bytes;
        self.stats.bytes_loaded += size_bytes as u64;
        let now = self.tick();
        self.entries.insert(
            key,
            CacheEntry {
                bitmap,
                last_accessed: now,
                size_bytes,
            },
        );
    }

    /// Remove a bitmap from the cache.
    pub fn remove(&mut self, key: &str) -> Option<Arc<Bitmap>> {
        self.entries.remove(key).map(|entry| {
            self.current_size -= entry.size_bytes;
            entry.bitmap
        })
    }

    /// Check if a bitmap is cached.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Clear all cached bitmaps.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    /// Number of cached bitmaps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current cache size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn evict_if_needed(&mut self, needed_bytes: usize) {
        while self.current_size + needed_bytes > self.limits.max_bytes && !self.entries.is_empty() {
            self.evict_lru();
        }
        while self.entries.len() >= self.limits.max_entries && !self.entries.is_empty() {
            self.evict_lru();
        }
    }

    fn evict_lru(&mut self) {
        let oldest_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest_key {
            if let Some(entry) = self.entries.remove(&key) {
                self.current_size -= entry.size_bytes;
                self.stats.evictions += 1;
                tracing::trace!("Evicted {key} from bitmap cache");
            }
        }
    }
}
