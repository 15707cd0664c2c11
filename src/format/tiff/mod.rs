//! TIFF container parsing.
//!
//! Pyramidal slide containers are TIFF (or BigTIFF) files whose IFD chain
//! carries the pyramid levels and auxiliary images.
//!
//! # Key Concepts
//!
//! - **Byte order**: declared in the header (II = little-endian,
//!   MM = big-endian); all multi-byte values must be read respecting it.
//!
//! - **Classic TIFF vs BigTIFF**: classic TIFF uses 32-bit offsets,
//!   BigTIFF uses 64-bit. The parser handles both transparently.
//!
//! - **IFD (Image File Directory)**: one per image. Pyramid levels are tiled
//!   IFDs; the overview and other auxiliary images are striped IFDs.
//!
//! - **Inline vs offset values**: small values are stored inline in the IFD
//!   entry, larger values at an offset pointed to by the entry.

mod parser;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use tags::{Compression, FieldType, TiffTag, PLANAR_CONFIG_CONTIGUOUS};
pub use values::ValueReader;
