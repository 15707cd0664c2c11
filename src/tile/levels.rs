//! Deep Zoom level ladder and native level mapping.
//!
//! Deep Zoom numbers levels from the bottom up: level 0 is at most 1x1 and
//! each level doubles until `max_level` equals the native full resolution.
//! Dimensions shrink by ceil-halving, so the ladder is fully determined by
//! the base dimensions.
//!
//! Native pyramids carry only a few of those levels (typically every 2 or 4
//! octaves). The mapper pairs each Deep Zoom level with a native level when
//! their dimensions agree within one pixel per axis; everything in between
//! is synthesized at request time.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// =============================================================================
// DeepZoomLevels
// =============================================================================

/// The dyadic level ladder of one pyramid, with its native level mapping.
#[derive(Debug, Clone)]
pub struct DeepZoomLevels {
    /// Level dimensions, index 0 smallest
    dims: Vec<(u32, u32)>,

    /// Deep Zoom level index -> native level index, where dimensions match
    map: Vec<Option<usize>>,

    /// Tile size shared by every level
    tile_size: u32,
}

impl DeepZoomLevels {
    /// Build the ladder for a scan of `base` dimensions and map the native
    /// levels (largest first) onto it.
    ///
    /// # Errors
    /// `InconsistentPyramid` if no native level matches the top of the
    /// ladder: a pyramid whose base can't be served natively is unusable.
    pub fn build(
        base: (u32, u32),
        native_dims: &[(u32, u32)],
        tile_size: u32,
    ) -> Result<Self, EngineError> {
        let (base_w, base_h) = base;

        let mut dims = Vec::new();
        let (mut w, mut h) = (base_w, base_h);
        dims.push((w, h));
        while w > 1 || h > 1 {
            w = w.div_ceil(2).max(1);
            h = h.div_ceil(2).max(1);
            dims.push((w, h));
        }
        dims.reverse();

        let mut map = vec![None; dims.len()];
        for (native_idx, &(nw, nh)) in native_dims.iter().enumerate() {
            // Native levels are strictly decreasing so each matches at most
            // one rung; unmatched natives are tolerated and stay unreachable
            for (dz_idx, &(dw, dh)) in dims.iter().enumerate() {
                if dw.abs_diff(nw) <= 1 && dh.abs_diff(nh) <= 1 {
                    map[dz_idx] = Some(native_idx);
                    break;
                }
            }
        }

        let max_level = dims.len() - 1;
        if map[max_level].is_none() {
            return Err(EngineError::InconsistentPyramid {
                width: base_w,
                height: base_h,
            });
        }

        Ok(Self {
            dims,
            map,
            tile_size,
        })
    }

    /// The highest level index (full resolution).
    #[inline]
    pub fn max_level(&self) -> u32 {
        (self.dims.len() - 1) as u32
    }

    /// Tile size shared by every level.
    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Dimensions of a level, `None` above `max_level`.
    pub fn level_dimensions(&self, level: u32) -> Option<(u32, u32)> {
        self.dims.get(level as usize).copied()
    }

    /// Native level backing this Deep Zoom level, `None` for synthesized levels.
    pub fn native_for(&self, level: u32) -> Option<usize> {
        self.map.get(level as usize).copied().flatten()
    }

    /// Tile grid `(cols, rows)` of a level, `None` above `max_level`.
    pub fn tile_grid(&self, level: u32) -> Option<(u32, u32)> {
        let (w, h) = self.level_dimensions(level)?;
        Some((w.div_ceil(self.tile_size), h.div_ceil(self.tile_size)))
    }

    /// Pixel dimensions of a tile's content at a level.
    pub fn tile_dimensions(&self, level: u32, col: u32, row: u32) -> Option<(u32, u32)> {
        let (w, h) = self.level_dimensions(level)?;
        let (cols, rows) = self.tile_grid(level)?;
        if col >= cols || row >= rows {
            return None;
        }

        let tw = if col == cols - 1 {
            (w - 1) % self.tile_size + 1
        } else {
            self.tile_size
        };
        let th = if row == rows - 1 {
            (h - 1) % self.tile_size + 1
        } else {
            self.tile_size
        };
        Some((tw, th))
    }
}

// =============================================================================
// PyramidDescriptor
// =============================================================================

/// Public descriptor of a pyramid, as consumed by Deep Zoom viewers.
///
/// Serializable so a serving layer can return it as JSON directly, with
/// [`PyramidDescriptor::to_dzi_xml`] for the classic DZI document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidDescriptor {
    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Tile overlap in pixels (always 0 for this engine)
    pub overlap: u32,

    /// Tile encoding format
    pub format: String,

    /// Full-resolution width in pixels
    pub width: u32,

    /// Full-resolution height in pixels
    pub height: u32,
}

impl PyramidDescriptor {
    /// Build the descriptor for a pyramid.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            tile_size,
            overlap: 0,
            format: "jpeg".to_string(),
            width,
            height,
        }
    }

    /// Render the Deep Zoom XML descriptor document.
    pub fn to_dzi_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
       TileSize="{tile_size}"
       Overlap="{overlap}"
       Format="{format}">
  <Size Width="{width}" Height="{height}" />
</Image>"#,
            tile_size = self.tile_size,
            overlap = self.overlap,
            format = self.format,
            width = self.width,
            height = self.height,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_from_base() {
        let levels = DeepZoomLevels::build((1000, 700), &[(1000, 700)], 256).unwrap();

        // 1000x700 halves 10 times before reaching 1x1
        assert_eq!(levels.max_level(), 10);
        assert_eq!(levels.level_dimensions(10), Some((1000, 700)));
        assert_eq!(levels.level_dimensions(9), Some((500, 350)));
        assert_eq!(levels.level_dimensions(8), Some((250, 175)));
        assert_eq!(levels.level_dimensions(7), Some((125, 88)));
        assert_eq!(levels.level_dimensions(0), Some((1, 1)));
        assert_eq!(levels.level_dimensions(11), None);
    }

    #[test]
    fn test_ceil_halving_rounds_up() {
        let levels = DeepZoomLevels::build((125, 88), &[(125, 88)], 256).unwrap();
        assert_eq!(levels.level_dimensions(levels.max_level() - 1), Some((63, 44)));
    }

    #[test]
    fn test_native_mapping() {
        let levels = DeepZoomLevels::build((1000, 700), &[(1000, 700), (250, 175)], 256).unwrap();

        assert_eq!(levels.native_for(10), Some(0));
        assert_eq!(levels.native_for(8), Some(1));
        // In-between and below: synthesized
        assert_eq!(levels.native_for(9), None);
        assert_eq!(levels.native_for(7), None);
        assert_eq!(levels.native_for(0), None);
    }

    #[test]
    fn test_native_mapping_tolerates_one_pixel() {
        // Native downsample chains drift by a pixel from exact ceil-halving
        let levels = DeepZoomLevels::build((1000, 700), &[(1000, 700), (249, 176)], 256).unwrap();
        assert_eq!(levels.native_for(8), Some(1));
    }

    #[test]
    fn test_unmatched_intermediate_native_is_tolerated() {
        // 333x233 matches no rung of the 1000x700 ladder
        let levels = DeepZoomLevels::build((1000, 700), &[(1000, 700), (333, 233)], 256).unwrap();
        assert_eq!(levels.native_for(10), Some(0));
        for level in 0..10 {
            assert_eq!(levels.native_for(level), None);
        }
    }

    #[test]
    fn test_inconsistent_pyramid_rejected() {
        // No native level within 1px of the declared base: fatal
        let result = DeepZoomLevels::build((1000, 700), &[(500, 350)], 256);
        assert!(matches!(
            result,
            Err(EngineError::InconsistentPyramid {
                width: 1000,
                height: 700
            })
        ));
    }

    #[test]
    fn test_tile_grid() {
        let levels = DeepZoomLevels::build((1000, 700), &[(1000, 700)], 256).unwrap();
        assert_eq!(levels.tile_grid(10), Some((4, 3)));
        assert_eq!(levels.tile_grid(9), Some((2, 2)));
        assert_eq!(levels.tile_grid(8), Some((1, 1)));
        assert_eq!(levels.tile_grid(0), Some((1, 1)));
        assert_eq!(levels.tile_grid(11), None);
    }

    #[test]
    fn test_tile_dimensions() {
        let levels = DeepZoomLevels::build((1000, 700), &[(1000, 700)], 256).unwrap();
        assert_eq!(levels.tile_dimensions(10, 0, 0), Some((256, 256)));
        assert_eq!(levels.tile_dimensions(10, 3, 2), Some((232, 188)));
        assert_eq!(levels.tile_dimensions(9, 1, 1), Some((244, 94)));
        assert_eq!(levels.tile_dimensions(10, 4, 0), None);
    }

    #[test]
    fn test_single_pixel_base() {
        let levels = DeepZoomLevels::build((1, 1), &[(1, 1)], 256).unwrap();
        assert_eq!(levels.max_level(), 0);
        assert_eq!(levels.level_dimensions(0), Some((1, 1)));
    }

    #[test]
    fn test_descriptor_serialization() {
        let desc = PyramidDescriptor::new(46920, 33600, 256);
        let json = serde_json::to_string(&desc).unwrap();
        let back: PyramidDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, back);
    }

    #[test]
    fn test_descriptor_dzi_xml() {
        let desc = PyramidDescriptor::new(46920, 33600, 256);
        let xml = desc.to_dzi_xml();

        assert!(xml.contains("TileSize=\"256\""));
        assert!(xml.contains("Overlap=\"0\""));
        assert!(xml.contains("Format=\"jpeg\""));
        assert!(xml.contains("Width=\"46920\""));
        assert!(xml.contains("Height=\"33600\""));
        assert!(xml.contains("xmlns=\"http://schemas.microsoft.com/deepzoom/2008\""));
    }
}
