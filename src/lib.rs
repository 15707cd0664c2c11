//! # WSI Deep Zoom
//!
//! A Deep Zoom tile engine for tiled pyramidal whole-slide images.
//!
//! Whole-slide scans are stored as TIFF containers whose tiles are
//! abbreviated JPEG streams: the entropy-coded data sits per tile while the
//! quantization and Huffman tables live once per series in a `JPEGTables`
//! fragment. This library reassembles standalone JPEG tiles from that layout
//! and exposes the container as a complete Deep Zoom pyramid, synthesizing
//! the levels the container does not carry natively.
//!
//! ## Features
//!
//! - **Byte-range access**: one positioned read per tile payload, no full
//!   decode of the source
//! - **Table stitching**: interior tiles are served by pure byte surgery,
//!   without a decode/encode round trip
//! - **Level synthesis**: missing dyadic levels are composed from the level
//!   above and downsampled on demand
//! - **Caching**: a byte-bounded LRU of encoded tiles per container, a
//!   singleflight layer collapsing concurrent renders, and a sharded
//!   on-disk thumbnail store
//!
//! ## Architecture
//!
//! - [`io`] - byte-range reader trait and the local-file implementation
//! - [`mod@format`] - TIFF structure parsing and JPEG stream surgery
//! - [`slide`] - container opening, series resolution, and the engine registry
//! - [`tile`] - level math, tile codec, synthesis, caches, thumbnails, engine
//! - [`config`] - engine tunables
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_deepzoom::{EngineConfig, SlideEngineRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SlideEngineRegistry::new(EngineConfig::default());
//!
//!     let engine = registry.open("/data/slides/case-7.svs").await?;
//!
//!     let descriptor = engine.descriptor();
//!     println!("{}", descriptor.to_dzi_xml());
//!
//!     // Full-resolution tile at column 3, row 2
//!     let tile = engine.get_tile(engine.levels().max_level(), 3, 2).await?;
//!     println!("tile: {} bytes", tile.len());
//!
//!     let thumb = engine.thumbnail(Some((256, 256))).await?;
//!     println!("thumbnail: {} bytes", thumb.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{EngineError, IoError, TiffError};
pub use io::{FileRangeReader, RangeReader};
pub use slide::{Container, NativeLevel, Overview, SeriesKind, SlideEngineRegistry};
pub use tile::{DeepZoomLevels, PyramidDescriptor, SlideEngine, TileCache, TileKey};
