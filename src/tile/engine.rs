//! The per-container tile engine.
//!
//! `SlideEngine` is the public face of one opened container: it owns the
//! parsed structure, the Deep Zoom level ladder, the tile codec, the tile
//! cache, and the thumbnail store, and serves every request through them.
//!
//! # Request flow
//!
//! ```text
//! get_tile(level, col, row)
//!   -> level/grid validation
//!   -> tile cache
//!   -> singleflight (one renderer per key, waiters share the result)
//!   -> mapped level: codec extraction
//!      unmapped level: recurse into the four children and downsample
//! ```
//!
//! Render errors are shared with the waiters of the in-flight request but
//! never cached, so a transient failure does not poison a tile.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::ImageFormat;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::format::jpeg::merge_tables;
use crate::io::RangeReader;
use crate::slide::Container;

use super::cache::{TileCache, TileKey};
use super::codec::{decode_jpeg, encode_jpeg, TileCodec};
use super::levels::{DeepZoomLevels, PyramidDescriptor};
use super::synth::{compose_and_downsample, ChildTile};
use super::thumbnail::{render_thumbnail, ThumbnailStore};

/// State of an in-flight tile render, shared between the rendering task and
/// any concurrent requesters of the same tile.
struct InFlightTile {
    /// Wakes waiters when the render completes
    notify: Notify,
    /// Render outcome, set before waiters are notified
    result: Mutex<Option<Result<Bytes, EngineError>>>,
}

// =============================================================================
// SlideEngine
// =============================================================================

/// Deep Zoom tile engine over one opened container.
pub struct SlideEngine<R: RangeReader> {
    container: Arc<Container<R>>,
    levels: DeepZoomLevels,
    codec: TileCodec<R>,
    cache: TileCache,

    /// In-flight renders for the singleflight pattern
    in_flight: Mutex<HashMap<TileKey, Arc<InFlightTile>>>,

    /// Serializes byte-range reads against the container
    io_guard: Arc<Mutex<()>>,

    store: ThumbnailStore,
    quality: u8,

    /// Number of overview decodes performed, for cache-hit verification
    overview_decodes: AtomicU64,
}

impl<R: RangeReader> SlideEngine<R> {
    /// Open a container and build its engine.
    ///
    /// # Errors
    /// Everything `Container::open` can return, plus `InconsistentPyramid`
    /// when the native base does not land on the level ladder and
    /// `UnsupportedContainerLayout` for non-square tiles.
    pub async fn open(reader: R, config: &EngineConfig) -> Result<Self, EngineError> {
        let container = Arc::new(Container::open(reader).await?);

        let (tile_w, tile_h) = container.tile_size();
        if tile_w != tile_h {
            return Err(EngineError::UnsupportedContainerLayout {
                reason: format!("non-square {tile_w}x{tile_h} tiles"),
            });
        }

        let base = (container.base_level().width, container.base_level().height);
        let native_dims: Vec<(u32, u32)> = container
            .levels()
            .iter()
            .map(|l| (l.width, l.height))
            .collect();
        let levels = DeepZoomLevels::build(base, &native_dims, tile_w)?;

        debug!(
            identifier = container.identity(),
            max_level = levels.max_level(),
            native_levels = native_dims.len(),
            "engine ready"
        );

        let io_guard = Arc::new(Mutex::new(()));
        let codec = TileCodec::new(
            Arc::clone(&container),
            Arc::clone(&io_guard),
            config.jpeg_quality,
        );

        Ok(Self {
            container,
            levels,
            codec,
            cache: TileCache::with_capacity(config.tile_cache_bytes, config.tile_cache_entries),
            in_flight: Mutex::new(HashMap::new()),
            io_guard,
            store: ThumbnailStore::new(&config.thumbnail_cache_dir),
            quality: config.jpeg_quality,
            overview_decodes: AtomicU64::new(0),
        })
    }

    /// Stable identity of the underlying container.
    pub fn identity(&self) -> &str {
        self.container.identity()
    }

    /// The pyramid's public descriptor.
    pub fn descriptor(&self) -> PyramidDescriptor {
        let max = self.levels.max_level();
        // max_level always has dimensions
        let (width, height) = self.levels.level_dimensions(max).unwrap_or((0, 0));
        PyramidDescriptor::new(width, height, self.levels.tile_size())
    }

    /// The Deep Zoom level ladder.
    pub fn levels(&self) -> &DeepZoomLevels {
        &self.levels
    }

    /// Number of overview decodes this engine has performed.
    pub fn overview_decode_count(&self) -> u64 {
        self.overview_decodes.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Tiles
    // -------------------------------------------------------------------------

    /// Get one tile as a standalone JPEG.
    ///
    /// # Errors
    /// - `TileLevelInvalid` above the pyramid's `max_level`
    /// - `TileOutOfBounds` outside the level's tile grid
    /// - `CorruptContainer` / `Decode` / `Encode` on pipeline failures
    pub async fn get_tile(&self, level: u32, col: u32, row: u32) -> Result<Bytes, EngineError> {
        let max_level = self.levels.max_level();
        if level > max_level {
            return Err(EngineError::TileLevelInvalid { level, max_level });
        }

        let Some((cols, rows)) = self.levels.tile_grid(level) else {
            return Err(EngineError::TileLevelInvalid { level, max_level });
        };
        if col >= cols || row >= rows {
            return Err(EngineError::TileOutOfBounds { level, col, row });
        }

        let key = TileKey::new(level, col, row);
        if let Some(data) = self.cache.get(&key).await {
            trace!(level, col, row, "tile cache hit");
            return Ok(data);
        }

        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(&key) {
                    // Another task is rendering this tile
                    state.clone()
                } else {
                    // We're the leader for this tile
                    let state = Arc::new(InFlightTile {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key, state.clone());
                    drop(in_flight);

                    let result = self.render_tile(level, col, row).await;

                    if let Ok(ref data) = result {
                        self.cache.put(key, data.clone()).await;
                    }

                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }
                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(&key);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Register for the wakeup before checking the result, so a leader
            // finishing in between cannot be missed
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let result_guard = state.result.lock().await;
                if let Some(ref result) = *result_guard {
                    return result.clone();
                }
            }

            notified.await;

            let result_guard = state.result.lock().await;
            if let Some(ref result) = *result_guard {
                return result.clone();
            }
            // Spurious wakeup without a result: loop back
        }
    }

    /// Render a tile, bypassing cache and singleflight.
    ///
    /// Boxed because synthesis recurses into `get_tile` for the children.
    fn render_tile(
        &self,
        level: u32,
        col: u32,
        row: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, EngineError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(native_index) = self.levels.native_for(level) {
                return self.codec.extract(level, native_index, col, row).await;
            }
            self.synthesize(level, col, row).await
        })
    }

    /// Build a tile of an unmapped level from its four children.
    async fn synthesize(&self, level: u32, col: u32, row: u32) -> Result<Bytes, EngineError> {
        trace!(level, col, row, "synthesizing tile");

        let mut children = Vec::with_capacity(4);
        for dy in 0..2u32 {
            for dx in 0..2u32 {
                match self.get_tile(level + 1, 2 * col + dx, 2 * row + dy).await {
                    Ok(bytes) => {
                        let image = decode_jpeg(&bytes)?;
                        children.push(ChildTile { dx, dy, image });
                    }
                    // Children past the child grid simply don't exist
                    Err(e) if e.is_out_of_bounds() => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        if children.is_empty() {
            return Err(EngineError::TileOutOfBounds { level, col, row });
        }

        let composed = compose_and_downsample(&children, self.levels.tile_size());
        encode_jpeg(&composed, self.quality)
    }

    // -------------------------------------------------------------------------
    // Thumbnails
    // -------------------------------------------------------------------------

    /// Get the container's thumbnail, rendered from the overview image.
    ///
    /// Served from the on-disk store when present; rendered, stored, and
    /// returned otherwise. `max_size` is a `(width, height)` bound the
    /// thumbnail fits within, preserving aspect ratio.
    pub async fn thumbnail(&self, max_size: Option<(u32, u32)>) -> Result<Bytes, EngineError> {
        let path = self.store.path_for(self.container.identity(), max_size);

        if let Some(data) = self.store.load(&path).await {
            trace!(path = %path.display(), "thumbnail store hit");
            return Ok(data);
        }

        let data = self.render_overview(max_size).await?;
        self.store.save(&path, &data).await?;
        Ok(data)
    }

    /// Re-render the thumbnail and overwrite the stored copy.
    pub async fn rebuild_thumbnail(
        &self,
        max_size: Option<(u32, u32)>,
    ) -> Result<Bytes, EngineError> {
        let path = self.store.path_for(self.container.identity(), max_size);
        let data = self.render_overview(max_size).await?;
        self.store.save(&path, &data).await?;
        Ok(data)
    }

    async fn render_overview(&self, max_size: Option<(u32, u32)>) -> Result<Bytes, EngineError> {
        let overview = self.container.overview()?;

        let (offset, len) =
            overview
                .single_strip()
                .ok_or_else(|| EngineError::UnsupportedContainerLayout {
                    reason: "overview image stored in multiple strips".to_string(),
                })?;

        let payload = {
            let _guard = self.io_guard.lock().await;
            self.container.read_range(offset, len).await?
        };

        let stream = merge_tables(overview.jpeg_tables.as_deref(), &payload);

        self.overview_decodes.fetch_add(1, Ordering::SeqCst);
        let image = image::load_from_memory_with_format(&stream, ImageFormat::Jpeg).map_err(
            |e| EngineError::CorruptContainer {
                reason: format!("overview image: {e}"),
            },
        )?;

        render_thumbnail(&image, max_size, self.quality)
    }
}
