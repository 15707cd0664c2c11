use thiserror::Error;

/// I/O errors that can occur when reading from the backing file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Failed to open the source file
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    /// Read failed partway through
    #[error("Read error: {0}")]
    Read(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Source file not found
    #[error("Source not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when parsing TIFF structure
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// IFD declares more entries than the parser accepts
    #[error("Excessive IFD entry count: {0}")]
    ExcessiveIfdEntryCount(u64),
}

/// Engine-level errors returned by the public tile API.
///
/// `TileOutOfBounds` and `TileLevelInvalid` are expected in normal operation
/// (viewers probe the tile grid); everything else indicates a problem with the
/// container or the request pipeline.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Failed to open or parse the container
    #[error("Failed to open container: {0}")]
    ContainerOpen(String),

    /// Structurally valid TIFF, but not a layout this engine serves
    #[error("Unsupported container layout: {reason}")]
    UnsupportedContainerLayout { reason: String },

    /// Recorded structure disagrees with the actual bytes
    #[error("Corrupt container: {reason}")]
    CorruptContainer { reason: String },

    /// No native level matches the full-resolution Deep Zoom level
    #[error("Inconsistent pyramid: no native level within 1px of {width}x{height} at the top level")]
    InconsistentPyramid { width: u32, height: u32 },

    /// The requested series does not exist in this container
    #[error("Series not found: {0}")]
    SeriesNotFound(&'static str),

    /// Tile coordinates fall outside the level's tile grid
    #[error("Tile ({col}, {row}) out of bounds at level {level}")]
    TileOutOfBounds { level: u32, col: u32, row: u32 },

    /// Requested level exceeds the pyramid's maximum level
    #[error("Invalid level {level}: maximum is {max_level}")]
    TileLevelInvalid { level: u32, max_level: u32 },

    /// JPEG decode failed on engine-produced data
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// JPEG encode failed
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// I/O error outside the container read path (e.g. the thumbnail store)
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl EngineError {
    /// Whether this error is an expected grid-probing miss rather than a failure.
    #[inline]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, EngineError::TileOutOfBounds { .. })
    }
}

impl From<TiffError> for EngineError {
    /// TIFF structure errors only surface while opening a container.
    fn from(err: TiffError) -> Self {
        EngineError::ContainerOpen(err.to_string())
    }
}
