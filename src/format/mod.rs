//! Container structure and stream handling.
//!
//! This module owns the two format concerns of the engine:
//!
//! - [`tiff`] parses the container's TIFF/BigTIFF skeleton (header, IFD
//!   chain, tag values)
//! - [`jpeg`] reassembles standalone JPEG streams from the shared table
//!   fragment and per-tile payloads

pub mod jpeg;
pub mod tiff;

pub use jpeg::{
    is_abbreviated_stream, is_complete_stream, merge_tables, stitch_tile, ADOBE_APP14,
};
