//! Overview thumbnails and their on-disk store.
//!
//! Thumbnails are rendered from the container's striped overview image and
//! persisted to a content-addressed directory tree. Presence on disk *is* the
//! cache index: a request first probes the store and only decodes the
//! overview on a miss (or when a rebuild is forced).
//!
//! # Store layout
//!
//! Paths shard on the hex SHA-256 of the container identity so directories
//! stay small even with many containers:
//!
//! ```text
//! <root>/<h[0]>/<h[0..2]>/<h[0..3]>/<urlencoded-identity>.<size>.jpg
//! ```
//!
//! The identity is URL-encoded into the file name so the mapping stays
//! reversible for operators poking at the store.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{EngineError, IoError};

use super::codec::encode_jpeg;

// =============================================================================
// Rendering
// =============================================================================

/// Fit a decoded overview into a `(width, height)` bound and encode it as
/// JPEG.
///
/// `None` keeps the overview's own dimensions. The fit preserves aspect
/// ratio, stays within both bounds, and never upscales.
pub fn render_thumbnail(
    image: &DynamicImage,
    max_size: Option<(u32, u32)>,
    quality: u8,
) -> Result<Bytes, EngineError> {
    match max_size {
        Some((max_w, max_h)) if image.width() > max_w || image.height() > max_h => {
            encode_jpeg(&image.thumbnail(max_w, max_h), quality)
        }
        _ => encode_jpeg(image, quality),
    }
}

// =============================================================================
// ThumbnailStore
// =============================================================================

/// Sharded on-disk store of rendered thumbnails.
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    /// Create a store rooted at `root`. Directories are created lazily on the
    /// first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store path for a container identity and size bound.
    pub fn path_for(&self, identity: &str, max_size: Option<(u32, u32)>) -> PathBuf {
        let digest = Sha256::digest(identity.as_bytes());
        let hash = hex::encode(digest);

        let size_label = match max_size {
            Some((max_w, max_h)) => format!("{max_w}x{max_h}"),
            None => "full".to_string(),
        };
        let file_name = format!("{}.{}.jpg", urlencoding::encode(identity), size_label);

        self.root
            .join(&hash[0..1])
            .join(&hash[0..2])
            .join(&hash[0..3])
            .join(file_name)
    }

    /// Load a stored thumbnail, `None` if it has not been rendered yet.
    pub async fn load(&self, path: &Path) -> Option<Bytes> {
        match tokio::fs::read(path).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(_) => None,
        }
    }

    /// Persist a rendered thumbnail, overwriting any previous one.
    pub async fn save(&self, path: &Path, data: &Bytes) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::Open {
                    path: parent.to_string_lossy().into_owned(),
                    message: e.to_string(),
                })?;
        }

        tokio::fs::write(path, data)
            .await
            .map_err(|e| IoError::Read(e.to_string()))?;

        debug!(path = %path.display(), bytes = data.len(), "stored thumbnail");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn overview(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb([120, 80, 40])))
    }

    #[test]
    fn test_render_bounded() {
        let data = render_thumbnail(&overview(120, 80), Some((64, 64)), 80).unwrap();
        let decoded = image::load_from_memory(&data).unwrap();
        assert!(decoded.width() <= 64 && decoded.height() <= 64);
        // Aspect preserved: 120x80 -> 64x42 or 64x43 depending on rounding
        assert_eq!(decoded.width(), 64);
    }

    #[test]
    fn test_render_rectangular_bound() {
        // Height is the binding constraint: 120x80 into (100, 40) -> 60x40
        let data = render_thumbnail(&overview(120, 80), Some((100, 40)), 80).unwrap();
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 40));
    }

    #[test]
    fn test_render_never_upscales() {
        let data = render_thumbnail(&overview(30, 20), Some((64, 64)), 80).unwrap();
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn test_render_unbounded() {
        let data = render_thumbnail(&overview(120, 80), None, 80).unwrap();
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn test_path_sharding() {
        let store = ThumbnailStore::new("/cache");
        let path = store.path_for("/data/slides/case 7.svs", Some((256, 256)));

        let parts: Vec<_> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        // root, three shard levels, file name
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[2].len(), 1);
        assert_eq!(parts[3].len(), 2);
        assert_eq!(parts[4].len(), 3);
        assert!(parts[3].starts_with(&parts[2]));
        assert!(parts[4].starts_with(&parts[3]));

        // Identity is encoded, not split across directories
        let file = parts.last().unwrap();
        assert!(file.ends_with(".256x256.jpg"));
        assert!(!file.contains('/'));
        assert!(file.contains("%2F"));
    }

    #[test]
    fn test_path_distinguishes_sizes() {
        let store = ThumbnailStore::new("/cache");
        let a = store.path_for("slide.svs", Some((64, 64)));
        let b = store.path_for("slide.svs", Some((128, 128)));
        let c = store.path_for("slide.svs", None);
        let d = store.path_for("slide.svs", Some((120, 80)));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, d);
        assert_eq!(a.parent(), b.parent());

        let file = d.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.ends_with(".120x80.jpg"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());

        let path = store.path_for("slide.svs", Some((64, 64)));
        assert!(store.load(&path).await.is_none());

        let data = Bytes::from_static(b"jpeg bytes");
        store.save(&path, &data).await.unwrap();

        assert_eq!(store.load(&path).await, Some(data));
    }
}
