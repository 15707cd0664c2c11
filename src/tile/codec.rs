//! Native tile extraction.
//!
//! The codec turns one native tile payload into a standalone JPEG the Deep
//! Zoom protocol can serve. Interior tiles are pure byte surgery: stitch the
//! shared table fragment onto the payload and return it, no pixel work at
//! all. Edge tiles carry padding beyond the level's pixel extent, so they go
//! through a decode, a crop to the covered region, and a re-encode.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::EngineError;
use crate::format::jpeg::{is_complete_stream, stitch_tile};
use crate::io::RangeReader;
use crate::slide::Container;

// =============================================================================
// JPEG helpers
// =============================================================================

/// Decode a JPEG stream produced by this engine.
pub(crate) fn decode_jpeg(data: &[u8]) -> Result<DynamicImage, EngineError> {
    image::load_from_memory_with_format(data, ImageFormat::Jpeg).map_err(|e| EngineError::Decode {
        message: e.to_string(),
    })
}

/// Encode an image as JPEG at the given quality.
pub(crate) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Bytes, EngineError> {
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| EngineError::Encode {
            message: e.to_string(),
        })?;
    Ok(Bytes::from(out.into_inner()))
}

// =============================================================================
// TileCodec
// =============================================================================

/// Extracts standalone JPEG tiles from a container's native levels.
pub struct TileCodec<R: RangeReader> {
    container: Arc<Container<R>>,

    /// Serializes payload reads against the container
    io_guard: Arc<Mutex<()>>,

    /// Quality for the edge-tile re-encode
    quality: u8,
}

impl<R: RangeReader> TileCodec<R> {
    /// Create a codec over an opened container.
    pub fn new(container: Arc<Container<R>>, io_guard: Arc<Mutex<()>>, quality: u8) -> Self {
        Self {
            container,
            io_guard,
            quality,
        }
    }

    /// Extract the tile at `(col, row)` of a native level as a standalone JPEG.
    ///
    /// `level` is the Deep Zoom level the request came in as; it only appears
    /// in errors so they name coordinates the caller recognizes.
    ///
    /// # Errors
    /// - `TileOutOfBounds` if `(col, row)` falls outside the level's grid
    /// - `CorruptContainer` if the payload can't be assembled into a JPEG
    /// - `Encode` if the edge-tile re-encode fails
    pub async fn extract(
        &self,
        level: u32,
        native_index: usize,
        col: u32,
        row: u32,
    ) -> Result<Bytes, EngineError> {
        let native = &self.container.levels()[native_index];

        let Some((offset, len)) = native.tile_location(col, row) else {
            return Err(EngineError::TileOutOfBounds { level, col, row });
        };

        let payload = {
            let _guard = self.io_guard.lock().await;
            self.container.read_range(offset, len).await?
        };

        let stitched = match self.container.jpeg_tables() {
            Some(tables) => {
                stitch_tile(tables, &payload).ok_or_else(|| EngineError::CorruptContainer {
                    reason: format!(
                        "tile ({col}, {row}) at native level {native_index} is not a JPEG stream"
                    ),
                })?
            }
            None => {
                // No shared tables: the payload must stand on its own
                if !is_complete_stream(&payload) {
                    return Err(EngineError::CorruptContainer {
                        reason: format!(
                            "tile ({col}, {row}) at native level {native_index} is abbreviated \
                             but the container has no JPEGTables"
                        ),
                    });
                }
                payload
            }
        };

        if !native.is_edge_tile(col, row) {
            return Ok(stitched);
        }

        // Edge tile: the encoded frame is tile-sized, the level only covers
        // part of it
        let (w, h) = native
            .tile_dimensions(col, row)
            .ok_or(EngineError::TileOutOfBounds { level, col, row })?;

        trace!(level, col, row, w, h, "cropping edge tile");

        let image = image::load_from_memory_with_format(&stitched, ImageFormat::Jpeg).map_err(
            |e| EngineError::CorruptContainer {
                reason: format!("tile ({col}, {row}) at native level {native_index}: {e}"),
            },
        )?;
        let cropped = image.crop_imm(0, 0, w, h);
        encode_jpeg(&cropped, self.quality)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_encode_decode_round_trip_dimensions() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, image::Rgb([200, 10, 10])));
        let encoded = encode_jpeg(&image, 80).unwrap();
        let decoded = decode_jpeg(&encoded).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn test_decode_rejects_junk() {
        let result = decode_jpeg(&[0x00, 0x01, 0x02]);
        assert!(matches!(result, Err(EngineError::Decode { .. })));
    }
}
