//! Cache for fully encoded Deep Zoom tiles.
//!
//! Every tile an engine hands out is cached here, keyed by its Deep Zoom
//! coordinates. The engine owns one cache per container, so the container
//! identity and JPEG quality are implicit in the cache instance.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. An entry bound
//! on the underlying LRU additionally caps bookkeeping overhead.

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::config::{DEFAULT_TILE_CACHE_BYTES, DEFAULT_TILE_CACHE_ENTRIES};

// =============================================================================
// TileKey
// =============================================================================

/// Deep Zoom coordinates of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Deep Zoom level (0 = 1x1)
    pub level: u32,

    /// Tile column (0-indexed from left)
    pub col: u32,

    /// Tile row (0-indexed from top)
    pub row: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

// =============================================================================
// TileCache
// =============================================================================

/// LRU cache for encoded JPEG tiles with byte- and entry-based capacity.
///
/// Thread-safe; shared across async tasks via `Arc`.
pub struct TileCache {
    /// The underlying LRU cache
    cache: RwLock<LruCache<TileKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl TileCache {
    /// Create a tile cache with default bounds.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_BYTES, DEFAULT_TILE_CACHE_ENTRIES)
    }

    /// Create a tile cache bounded to `max_size` bytes and `max_entries` tiles.
    pub fn with_capacity(max_size: usize, max_entries: usize) -> Self {
        let max_entries = std::num::NonZeroUsize::new(max_entries)
            .unwrap_or(std::num::NonZeroUsize::new(1).unwrap());
        Self {
            cache: RwLock::new(LruCache::new(max_entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a tile, marking it recently used.
    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check if a tile is cached without updating LRU order.
    pub async fn contains(&self, key: &TileKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile, evicting least-recently-used entries until the cache is
    /// within its byte capacity.
    pub async fn put(&self, key: TileKey, data: Bytes) {
        let data_size = data.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        // push returns the displaced entry, whether replaced under the same
        // key or evicted by the entry bound
        if let Some((_, old_data)) = cache.push(key, data) {
            *current_size = current_size.saturating_sub(old_data.len());
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            if let Some((_, evicted_data)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted_data.len());
            } else {
                break;
            }
        }
    }

    /// Current number of cached tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Whether the cache holds no tiles.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        let current_size = self.current_size.read().await;
        *current_size
    }

    /// Byte capacity of the cache.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tile(size: usize) -> Bytes {
        Bytes::from(vec![0u8; size])
    }

    #[tokio::test]
    async fn test_basic_get_put() {
        let cache = TileCache::new();

        let key = TileKey::new(10, 1, 2);
        let data = make_tile(1000);

        assert!(cache.get(&key).await.is_none());

        cache.put(key, data.clone()).await;

        let retrieved = cache.get(&key).await;
        assert_eq!(retrieved, Some(data));
    }

    #[tokio::test]
    async fn test_contains() {
        let cache = TileCache::new();

        let key = TileKey::new(0, 0, 0);
        assert!(!cache.contains(&key).await);

        cache.put(key, make_tile(100)).await;
        assert!(cache.contains(&key).await);
    }

    #[tokio::test]
    async fn test_size_tracking() {
        let cache = TileCache::with_capacity(10_000, 100);

        assert_eq!(cache.size().await, 0);

        cache.put(TileKey::new(10, 0, 0), make_tile(1000)).await;
        assert_eq!(cache.size().await, 1000);

        cache.put(TileKey::new(10, 1, 0), make_tile(2000)).await;
        assert_eq!(cache.size().await, 3000);
    }

    #[tokio::test]
    async fn test_size_based_eviction() {
        let cache = TileCache::with_capacity(1000, 100);

        cache.put(TileKey::new(10, 0, 0), make_tile(400)).await;
        cache.put(TileKey::new(10, 1, 0), make_tile(400)).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.size().await, 800);

        // Pushes the total over capacity, evicting the LRU entry
        cache.put(TileKey::new(10, 2, 0), make_tile(400)).await;

        assert!(cache.size().await <= 1000);
        assert!(!cache.contains(&TileKey::new(10, 0, 0)).await);
        assert!(cache.contains(&TileKey::new(10, 1, 0)).await);
        assert!(cache.contains(&TileKey::new(10, 2, 0)).await);
    }

    #[tokio::test]
    async fn test_entry_based_eviction() {
        let cache = TileCache::with_capacity(1_000_000, 2);

        cache.put(TileKey::new(10, 0, 0), make_tile(100)).await;
        cache.put(TileKey::new(10, 1, 0), make_tile(100)).await;
        cache.put(TileKey::new(10, 2, 0), make_tile(100)).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.size().await, 200);
        assert!(!cache.contains(&TileKey::new(10, 0, 0)).await);
    }

    #[tokio::test]
    async fn test_update_existing_entry() {
        let cache = TileCache::with_capacity(10_000, 100);

        let key = TileKey::new(10, 0, 0);

        cache.put(key, make_tile(1000)).await;
        assert_eq!(cache.size().await, 1000);

        cache.put(key, make_tile(500)).await;
        assert_eq!(cache.size().await, 500);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_lru_order() {
        let cache = TileCache::with_capacity(1500, 100);

        cache.put(TileKey::new(10, 0, 0), make_tile(500)).await;
        cache.put(TileKey::new(10, 1, 0), make_tile(500)).await;
        cache.put(TileKey::new(10, 2, 0), make_tile(500)).await;

        // Touch the oldest entry so the middle one is now LRU
        cache.get(&TileKey::new(10, 0, 0)).await;

        cache.put(TileKey::new(10, 3, 0), make_tile(500)).await;

        assert!(cache.contains(&TileKey::new(10, 0, 0)).await);
        assert!(!cache.contains(&TileKey::new(10, 1, 0)).await);
        assert!(cache.contains(&TileKey::new(10, 2, 0)).await);
        assert!(cache.contains(&TileKey::new(10, 3, 0)).await);
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(TileKey::new(10, 1, 2), TileKey::new(10, 1, 2));
        assert_ne!(TileKey::new(10, 1, 2), TileKey::new(9, 1, 2));
    }
}
