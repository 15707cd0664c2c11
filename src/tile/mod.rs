//! Tile pipeline.
//!
//! Everything between an opened container and the JPEG bytes handed to a
//! viewer lives here:
//!
//! - [`levels`]: the Deep Zoom level ladder, native level mapping, and the
//!   public pyramid descriptor
//! - [`codec`]: native tile extraction (table stitching, edge-tile cropping)
//! - [`synth`]: composition and downsampling for levels the container does
//!   not carry natively
//! - [`cache`]: the byte- and entry-bounded LRU of encoded tiles
//! - [`thumbnail`]: overview rendering and the sharded on-disk store
//! - [`engine`]: the facade tying the above together per container
//!
//! # Request flow
//!
//! ```text
//! SlideEngine::get_tile
//!       │
//!       ├── TileCache ── hit ──> encoded JPEG
//!       │
//!       ├── mapped level ──> TileCodec (stitch, crop edges)
//!       │
//!       └── unmapped level ──> synthesis (4 children, compose, halve)
//!                                   │
//!                                   └── recurses into get_tile
//! ```

mod cache;
mod codec;
mod engine;
mod levels;
mod synth;
mod thumbnail;

pub use cache::{TileCache, TileKey};
pub use codec::TileCodec;
pub use engine::SlideEngine;
pub use levels::{DeepZoomLevels, PyramidDescriptor};
pub use synth::{compose_and_downsample, ChildTile};
pub use thumbnail::{render_thumbnail, ThumbnailStore};
