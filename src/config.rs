//! Engine configuration.
//!
//! Plain values with sensible defaults; loading them from files or the
//! environment is the embedding application's job.

use std::path::PathBuf;

/// Default tile cache capacity: 64MB per open container
pub const DEFAULT_TILE_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Default maximum number of cached tiles (bounds LRU bookkeeping)
pub const DEFAULT_TILE_CACHE_ENTRIES: usize = 4096;

/// Default JPEG quality for re-encoded tiles and thumbnails
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Default number of simultaneously open containers held by the registry
pub const DEFAULT_OPEN_CONTAINERS: usize = 16;

/// Tunables shared by every engine a registry opens.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tile cache capacity in bytes, per container
    pub tile_cache_bytes: usize,

    /// Maximum number of cached tiles, per container
    pub tile_cache_entries: usize,

    /// JPEG quality (1-100) for tiles that go through a re-encode
    pub jpeg_quality: u8,

    /// Root directory of the on-disk thumbnail store
    pub thumbnail_cache_dir: PathBuf,

    /// Number of opened containers the registry keeps alive
    pub open_containers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_cache_bytes: DEFAULT_TILE_CACHE_BYTES,
            tile_cache_entries: DEFAULT_TILE_CACHE_ENTRIES,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            thumbnail_cache_dir: std::env::temp_dir().join("wsi-deepzoom").join("thumbnails"),
            open_containers: DEFAULT_OPEN_CONTAINERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tile_cache_bytes, 64 * 1024 * 1024);
        assert_eq!(config.jpeg_quality, 80);
        assert!(config.thumbnail_cache_dir.ends_with("thumbnails"));
    }
}
