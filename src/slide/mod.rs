//! Container opening and lifecycle.
//!
//! A "slide" is one pyramidal container file. This module opens containers,
//! resolves their image series, and keeps engines alive across requests:
//!
//! - [`container`]: parses the IFD chain once and classifies the images into
//!   the tiled pyramid series and the striped overview
//! - [`registry`]: memoizes engine opens per path with LRU + singleflight
//!
//! ```text
//! SlideEngineRegistry::open(path)
//!       │
//!       ├── engine LRU ── hit ──> Arc<SlideEngine>
//!       │
//!       └── FileRangeReader::open ──> Container::open ──> SlideEngine
//! ```

mod container;
mod registry;

pub use container::{Container, NativeLevel, Overview, SeriesKind};
pub use registry::SlideEngineRegistry;
