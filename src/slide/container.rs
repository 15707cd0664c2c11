//! Container opening and series resolution.
//!
//! A slide container holds several images in one TIFF file: the tiled
//! pyramid levels of the full-resolution scan, plus striped auxiliary images
//! (overview, label, macro). Opening a container parses the whole IFD chain
//! once, classifies the images into series, and eagerly loads the per-level
//! tile location arrays so that serving a tile later needs exactly one
//! byte-range read.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{EngineError, TiffError};
use crate::format::tiff::{
    Compression, Ifd, TiffHeader, TiffTag, ValueReader, BIGTIFF_HEADER_SIZE,
    PLANAR_CONFIG_CONTIGUOUS,
};
use crate::io::RangeReader;

/// Safety cap on IFD chain length (cycles, corrupt next-offsets).
const MAX_IFDS: usize = 64;

// =============================================================================
// SeriesKind
// =============================================================================

/// The image series a container can expose.
///
/// Closed enum rather than free-form series names: callers can only ask for
/// what the engine actually serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    /// The tiled multi-resolution pyramid of the scan itself
    FullPyramid,
    /// The low-resolution overview image used for thumbnails
    Overview,
}

impl SeriesKind {
    /// Stable name for logging and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            SeriesKind::FullPyramid => "full_pyramid",
            SeriesKind::Overview => "overview",
        }
    }
}

// =============================================================================
// NativeLevel
// =============================================================================

/// One tiled resolution level of the pyramid series.
///
/// Levels are ordered by area: index 0 is the full-resolution base, each
/// following level is strictly smaller.
#[derive(Debug, Clone)]
pub struct NativeLevel {
    /// Position in the sorted pyramid (0 = base)
    pub index: usize,

    /// Level width in pixels
    pub width: u32,

    /// Level height in pixels
    pub height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Byte offset of each tile payload, row-major
    pub tile_offsets: Vec<u64>,

    /// Byte count of each tile payload, row-major
    pub tile_byte_counts: Vec<u64>,
}

impl NativeLevel {
    /// Number of tile columns.
    #[inline]
    pub fn tiles_across(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    /// Number of tile rows.
    #[inline]
    pub fn tiles_down(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }

    /// Flattened row-major index of a tile, `None` if out of the grid.
    pub fn tile_index(&self, col: u32, row: u32) -> Option<usize> {
        if col >= self.tiles_across() || row >= self.tiles_down() {
            return None;
        }
        Some((row as u64 * self.tiles_across() as u64 + col as u64) as usize)
    }

    /// Byte range of a tile payload, `None` if out of the grid.
    pub fn tile_location(&self, col: u32, row: u32) -> Option<(u64, u64)> {
        let idx = self.tile_index(col, row)?;
        Some((self.tile_offsets[idx], self.tile_byte_counts[idx]))
    }

    /// Pixel dimensions of a tile's meaningful content.
    ///
    /// Interior tiles are full-size; tiles in the last column or row only
    /// cover the remainder of the level, `((dim - 1) mod tile) + 1` pixels.
    pub fn tile_dimensions(&self, col: u32, row: u32) -> Option<(u32, u32)> {
        if col >= self.tiles_across() || row >= self.tiles_down() {
            return None;
        }

        let w = if col == self.tiles_across() - 1 {
            (self.width - 1) % self.tile_width + 1
        } else {
            self.tile_width
        };
        let h = if row == self.tiles_down() - 1 {
            (self.height - 1) % self.tile_height + 1
        } else {
            self.tile_height
        };

        Some((w, h))
    }

    /// Whether the tile's content is smaller than the tile frame.
    pub fn is_edge_tile(&self, col: u32, row: u32) -> bool {
        match self.tile_dimensions(col, row) {
            Some((w, h)) => w != self.tile_width || h != self.tile_height,
            None => false,
        }
    }
}

// =============================================================================
// Overview
// =============================================================================

/// The striped overview image of a container.
#[derive(Debug, Clone)]
pub struct Overview {
    /// Overview width in pixels
    pub width: u32,

    /// Overview height in pixels
    pub height: u32,

    /// Byte offset of each strip
    pub strip_offsets: Vec<u64>,

    /// Byte count of each strip
    pub strip_byte_counts: Vec<u64>,

    /// Table fragment for the overview's own abbreviated stream, if any
    pub jpeg_tables: Option<Bytes>,
}

impl Overview {
    /// The byte range of the overview stream, if it is stored as one strip.
    ///
    /// Multi-strip JPEG overviews would need per-strip reassembly, which no
    /// known writer produces; they are reported as an unsupported layout.
    pub fn single_strip(&self) -> Option<(u64, u64)> {
        if self.strip_offsets.len() == 1 && self.strip_byte_counts.len() == 1 {
            Some((self.strip_offsets[0], self.strip_byte_counts[0]))
        } else {
            None
        }
    }
}

// =============================================================================
// Container
// =============================================================================

/// An opened slide container with its series resolved.
///
/// All structure is parsed up front; afterwards the container only performs
/// byte-range reads for tile and overview payloads.
pub struct Container<R: RangeReader> {
    reader: R,
    header: TiffHeader,
    levels: Vec<NativeLevel>,
    jpeg_tables: Option<Bytes>,
    overview: Option<Overview>,
}

impl<R: RangeReader> Container<R> {
    /// Open a container: parse the IFD chain and resolve the series.
    ///
    /// # Errors
    /// - `ContainerOpen` if the file is not parseable TIFF
    /// - `UnsupportedContainerLayout` if there is no tiled JPEG pyramid
    /// - `CorruptContainer` if recorded structure is internally inconsistent
    pub async fn open(reader: R) -> Result<Self, EngineError> {
        let file_size = reader.size();
        let header_len = BIGTIFF_HEADER_SIZE.min(file_size as usize);
        let header_bytes = reader
            .read_exact_at(0, header_len)
            .await
            .map_err(|e| EngineError::ContainerOpen(e.to_string()))?;
        let header = TiffHeader::parse(&header_bytes, file_size)?;

        debug!(
            identifier = reader.identifier(),
            bigtiff = header.is_bigtiff,
            "parsing container IFD chain"
        );

        let ifds = Self::parse_ifd_chain(&reader, &header, file_size).await?;
        Self::classify(reader, header, ifds).await
    }

    /// Walk the IFD chain, fetching each directory with two range reads
    /// (entry count, then the full directory).
    async fn parse_ifd_chain(
        reader: &R,
        header: &TiffHeader,
        file_size: u64,
    ) -> Result<Vec<Ifd>, EngineError> {
        let mut ifds = Vec::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if offset >= file_size {
                return Err(TiffError::InvalidIfdOffset(offset).into());
            }

            let count_bytes = reader
                .read_exact_at(offset, header.ifd_count_size())
                .await
                .map_err(TiffError::from)?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };

            let ifd_size = Ifd::byte_size(entry_count, header).map_err(EngineError::from)?;
            let ifd_bytes = reader
                .read_exact_at(offset, ifd_size)
                .await
                .map_err(TiffError::from)?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    /// Classify parsed IFDs into the pyramid and overview series.
    async fn classify(reader: R, header: TiffHeader, ifds: Vec<Ifd>) -> Result<Self, EngineError> {
        let byte_order = header.byte_order;
        let values = ValueReader::new(&reader, &header);

        let mut levels: Vec<NativeLevel> = Vec::new();
        let mut base_jpeg_tables: Option<Bytes> = None;
        let mut overview: Option<Overview> = None;

        for (ifd_index, ifd) in ifds.iter().enumerate() {
            if ifd.is_tiled() {
                let level =
                    Self::load_level(&values, ifd, ifd_index, byte_order, levels.len()).await?;
                // The base level's table fragment is shared across the series
                if levels.is_empty() {
                    if let Some(entry) = ifd.get_entry(TiffTag::JpegTables) {
                        base_jpeg_tables = Some(values.read_raw_bytes(entry).await?);
                    }
                }
                levels.push(level);
            } else if overview.is_none() {
                overview = Self::load_overview(&values, ifd, ifd_index, byte_order).await?;
            }
            // Further striped IFDs (label, macro) are not served
        }

        if levels.is_empty() {
            return Err(EngineError::UnsupportedContainerLayout {
                reason: "container has no tiled pyramid levels".to_string(),
            });
        }

        // Largest level first; the IFD chain usually already is, but the
        // format doesn't guarantee it
        levels.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));
        for (i, level) in levels.iter_mut().enumerate() {
            level.index = i;
        }

        for pair in levels.windows(2) {
            if pair[1].width >= pair[0].width || pair[1].height >= pair[0].height {
                return Err(EngineError::UnsupportedContainerLayout {
                    reason: format!(
                        "pyramid levels not strictly decreasing: {}x{} followed by {}x{}",
                        pair[0].width, pair[0].height, pair[1].width, pair[1].height
                    ),
                });
            }
            if pair[1].tile_width != pair[0].tile_width
                || pair[1].tile_height != pair[0].tile_height
            {
                return Err(EngineError::UnsupportedContainerLayout {
                    reason: "pyramid levels use differing tile sizes".to_string(),
                });
            }
        }

        debug!(
            identifier = reader.identifier(),
            levels = levels.len(),
            base_width = levels[0].width,
            base_height = levels[0].height,
            has_overview = overview.is_some(),
            "container opened"
        );

        Ok(Self {
            reader,
            header,
            levels,
            jpeg_tables: base_jpeg_tables,
            overview,
        })
    }

    async fn load_level(
        values: &ValueReader<'_, R>,
        ifd: &Ifd,
        ifd_index: usize,
        byte_order: crate::format::tiff::ByteOrder,
        level_index: usize,
    ) -> Result<NativeLevel, EngineError> {
        let width = ifd
            .image_width(byte_order)
            .ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = ifd
            .image_height(byte_order)
            .ok_or(TiffError::MissingTag("ImageLength"))?;
        let tile_width = ifd
            .tile_width(byte_order)
            .ok_or(TiffError::MissingTag("TileWidth"))?;
        let tile_height = ifd
            .tile_height(byte_order)
            .ok_or(TiffError::MissingTag("TileLength"))?;

        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(EngineError::CorruptContainer {
                reason: format!("IFD {ifd_index} has zero-sized image or tile dimensions"),
            });
        }

        match ifd.compression(byte_order) {
            Some(c) if c.is_supported() => {}
            Some(c) => {
                return Err(EngineError::UnsupportedContainerLayout {
                    reason: format!("pyramid level compressed as {}, only JPEG is served", c.name()),
                });
            }
            None => {
                return Err(EngineError::UnsupportedContainerLayout {
                    reason: "pyramid level has unrecognized compression".to_string(),
                });
            }
        }

        if ifd.planar_configuration(byte_order) != PLANAR_CONFIG_CONTIGUOUS {
            return Err(EngineError::UnsupportedContainerLayout {
                reason: "pyramid level uses planar component layout".to_string(),
            });
        }

        let offsets_entry = ifd
            .get_entry(TiffTag::TileOffsets)
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let counts_entry = ifd
            .get_entry(TiffTag::TileByteCounts)
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;

        let tile_offsets = values.read_u64_array(offsets_entry).await?;
        let tile_byte_counts = values.read_u64_array(counts_entry).await?;

        let grid = width.div_ceil(tile_width) as usize * height.div_ceil(tile_height) as usize;
        if tile_offsets.len() < grid || tile_byte_counts.len() < grid {
            return Err(EngineError::CorruptContainer {
                reason: format!(
                    "IFD {ifd_index}: tile arrays hold {} offsets / {} counts for a {grid}-tile grid",
                    tile_offsets.len(),
                    tile_byte_counts.len()
                ),
            });
        }

        Ok(NativeLevel {
            index: level_index,
            width,
            height,
            tile_width,
            tile_height,
            tile_offsets,
            tile_byte_counts,
        })
    }

    /// Try to read a striped IFD as the overview image.
    ///
    /// Returns `Ok(None)` when the IFD is not a usable overview (non-JPEG
    /// auxiliary images like labels are simply skipped).
    async fn load_overview(
        values: &ValueReader<'_, R>,
        ifd: &Ifd,
        ifd_index: usize,
        byte_order: crate::format::tiff::ByteOrder,
    ) -> Result<Option<Overview>, EngineError> {
        let (Some(width), Some(height)) =
            (ifd.image_width(byte_order), ifd.image_height(byte_order))
        else {
            warn!(ifd_index, "skipping striped IFD without dimensions");
            return Ok(None);
        };

        if !matches!(ifd.compression(byte_order), Some(Compression::Jpeg)) {
            return Ok(None);
        }

        let (Some(offsets_entry), Some(counts_entry)) = (
            ifd.get_entry(TiffTag::StripOffsets),
            ifd.get_entry(TiffTag::StripByteCounts),
        ) else {
            warn!(ifd_index, "skipping striped IFD without strip data");
            return Ok(None);
        };

        let strip_offsets = values.read_u64_array(offsets_entry).await?;
        let strip_byte_counts = values.read_u64_array(counts_entry).await?;

        let jpeg_tables = match ifd.get_entry(TiffTag::JpegTables) {
            Some(entry) => Some(values.read_raw_bytes(entry).await?),
            None => None,
        };

        Ok(Some(Overview {
            width,
            height,
            strip_offsets,
            strip_byte_counts,
            jpeg_tables,
        }))
    }

    /// Stable identity of this container (the path it was opened from).
    pub fn identity(&self) -> &str {
        self.reader.identifier()
    }

    /// The pyramid levels, largest first.
    pub fn levels(&self) -> &[NativeLevel] {
        &self.levels
    }

    /// The full-resolution base level.
    pub fn base_level(&self) -> &NativeLevel {
        &self.levels[0]
    }

    /// Tile size of the pyramid series (uniform across levels).
    pub fn tile_size(&self) -> (u32, u32) {
        (self.levels[0].tile_width, self.levels[0].tile_height)
    }

    /// The shared per-series JPEG table fragment, if the container has one.
    pub fn jpeg_tables(&self) -> Option<&Bytes> {
        self.jpeg_tables.as_ref()
    }

    /// Resolve the overview series.
    pub fn overview(&self) -> Result<&Overview, EngineError> {
        self.overview
            .as_ref()
            .ok_or(EngineError::SeriesNotFound(SeriesKind::Overview.name()))
    }

    /// Read a payload byte range from the container.
    ///
    /// Ranges come from the parsed tile/strip location arrays, so a range
    /// that falls outside the file means the arrays lie about the content.
    pub async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes, EngineError> {
        self.reader
            .read_exact_at(offset, len as usize)
            .await
            .map_err(|e| match e {
                crate::error::IoError::RangeOutOfBounds { .. } => EngineError::CorruptContainer {
                    reason: format!("recorded payload range {offset}+{len} exceeds the file"),
                },
                other => EngineError::Io(other),
            })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_level(width: u32, height: u32, tile: u32) -> NativeLevel {
        let tiles =
            (width.div_ceil(tile) as usize) * (height.div_ceil(tile) as usize);
        NativeLevel {
            index: 0,
            width,
            height,
            tile_width: tile,
            tile_height: tile,
            tile_offsets: vec![0; tiles],
            tile_byte_counts: vec![0; tiles],
        }
    }

    #[test]
    fn test_tile_grid() {
        let level = make_level(1000, 700, 256);
        assert_eq!(level.tiles_across(), 4);
        assert_eq!(level.tiles_down(), 3);
        assert_eq!(level.tile_index(0, 0), Some(0));
        assert_eq!(level.tile_index(3, 2), Some(11));
        assert_eq!(level.tile_index(1, 2), Some(9));
        assert_eq!(level.tile_index(4, 0), None);
        assert_eq!(level.tile_index(0, 3), None);
    }

    #[test]
    fn test_tile_dimensions_interior_and_edge() {
        let level = make_level(1000, 700, 256);

        assert_eq!(level.tile_dimensions(0, 0), Some((256, 256)));
        assert_eq!(level.tile_dimensions(2, 1), Some((256, 256)));
        // Right edge: 1000 - 3*256 = 232
        assert_eq!(level.tile_dimensions(3, 0), Some((232, 256)));
        // Bottom edge: 700 - 2*256 = 188
        assert_eq!(level.tile_dimensions(0, 2), Some((256, 188)));
        // Corner
        assert_eq!(level.tile_dimensions(3, 2), Some((232, 188)));

        assert!(!level.is_edge_tile(0, 0));
        assert!(level.is_edge_tile(3, 0));
        assert!(level.is_edge_tile(0, 2));
    }

    #[test]
    fn test_tile_dimensions_exact_fit() {
        // 512x512 with 256 tiles: no partial tiles anywhere
        let level = make_level(512, 512, 256);
        assert_eq!(level.tile_dimensions(1, 1), Some((256, 256)));
        assert!(!level.is_edge_tile(1, 1));
    }

    #[test]
    fn test_single_tile_level() {
        let level = make_level(250, 175, 256);
        assert_eq!(level.tiles_across(), 1);
        assert_eq!(level.tiles_down(), 1);
        assert_eq!(level.tile_dimensions(0, 0), Some((250, 175)));
        assert!(level.is_edge_tile(0, 0));
    }

    #[test]
    fn test_overview_single_strip() {
        let one = Overview {
            width: 100,
            height: 80,
            strip_offsets: vec![500],
            strip_byte_counts: vec![1234],
            jpeg_tables: None,
        };
        assert_eq!(one.single_strip(), Some((500, 1234)));

        let many = Overview {
            width: 100,
            height: 80,
            strip_offsets: vec![500, 600],
            strip_byte_counts: vec![100, 100],
            jpeg_tables: None,
        };
        assert_eq!(many.single_strip(), None);
    }

    #[test]
    fn test_series_kind_names() {
        assert_eq!(SeriesKind::FullPyramid.name(), "full_pyramid");
        assert_eq!(SeriesKind::Overview.name(), "overview");
    }
}
