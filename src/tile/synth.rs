//! Dyadic level synthesis.
//!
//! Deep Zoom levels with no native counterpart are built from the level above:
//! each output tile is the 2x downsample of the 2x2 block of child tiles at
//! `(2*col + dx, 2*row + dy)`. Tiles at the right or bottom of the grid have
//! fewer than four children; the composition only covers the extent the
//! children actually fill, so edge tiles keep their exact protocol dimensions
//! through the downsample.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

// =============================================================================
// ChildTile
// =============================================================================

/// One decoded child tile with its position in the 2x2 block.
pub struct ChildTile {
    /// Horizontal position in the block (0 or 1)
    pub dx: u32,

    /// Vertical position in the block (0 or 1)
    pub dy: u32,

    /// Decoded pixel data
    pub image: DynamicImage,
}

// =============================================================================
// Composition
// =============================================================================

/// Compose child tiles onto a canvas and downsample the covered extent by 2.
///
/// The caller guarantees `children` is non-empty and every child fits its
/// `tile_size`-aligned slot. The output dimensions are the ceil-halved
/// dimensions of the covered extent, which is exactly the parent tile's
/// protocol dimensions.
pub fn compose_and_downsample(children: &[ChildTile], tile_size: u32) -> DynamicImage {
    let mut canvas = RgbImage::new(tile_size * 2, tile_size * 2);

    let mut covered_w = 0u32;
    let mut covered_h = 0u32;

    for child in children {
        let x = child.dx * tile_size;
        let y = child.dy * tile_size;
        let rgb = child.image.to_rgb8();

        covered_w = covered_w.max(x + rgb.width());
        covered_h = covered_h.max(y + rgb.height());

        imageops::replace(&mut canvas, &rgb, x as i64, y as i64);
    }

    let covered = imageops::crop_imm(&canvas, 0, 0, covered_w, covered_h).to_image();

    let out = imageops::resize(
        &covered,
        covered_w.div_ceil(2).max(1),
        covered_h.div_ceil(2).max(1),
        FilterType::Triangle,
    );
    DynamicImage::ImageRgb8(out)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
    }

    #[test]
    fn test_full_block_halves_to_tile_size() {
        let children = vec![
            ChildTile { dx: 0, dy: 0, image: solid(256, 256, [255, 0, 0]) },
            ChildTile { dx: 1, dy: 0, image: solid(256, 256, [0, 255, 0]) },
            ChildTile { dx: 0, dy: 1, image: solid(256, 256, [0, 0, 255]) },
            ChildTile { dx: 1, dy: 1, image: solid(256, 256, [255, 255, 0]) },
        ];

        let out = compose_and_downsample(&children, 256);
        assert_eq!(out.width(), 256);
        assert_eq!(out.height(), 256);

        // Each quadrant keeps its child's color
        let rgb = out.to_rgb8();
        assert_eq!(rgb.get_pixel(64, 64), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(192, 64), &Rgb([0, 255, 0]));
        assert_eq!(rgb.get_pixel(64, 192), &Rgb([0, 0, 255]));
        assert_eq!(rgb.get_pixel(192, 192), &Rgb([255, 255, 0]));
    }

    #[test]
    fn test_partial_block_covers_only_children() {
        // Bottom row of a pyramid: children exist only at dy = 0
        let children = vec![
            ChildTile { dx: 0, dy: 0, image: solid(256, 188, [10, 10, 10]) },
            ChildTile { dx: 1, dy: 0, image: solid(232, 188, [10, 10, 10]) },
        ];

        let out = compose_and_downsample(&children, 256);
        assert_eq!(out.width(), 244); // ceil(488 / 2)
        assert_eq!(out.height(), 94); // ceil(188 / 2)
    }

    #[test]
    fn test_single_child() {
        let children = vec![ChildTile { dx: 0, dy: 0, image: solid(250, 175, [50, 60, 70]) }];

        let out = compose_and_downsample(&children, 256);
        assert_eq!(out.width(), 125);
        assert_eq!(out.height(), 88); // ceil(175 / 2)
    }

    #[test]
    fn test_odd_extent_rounds_up() {
        let children = vec![ChildTile { dx: 0, dy: 0, image: solid(1, 1, [0, 0, 0]) }];

        let out = compose_and_downsample(&children, 256);
        assert_eq!(out.width(), 1);
        assert_eq!(out.height(), 1);
    }
}
