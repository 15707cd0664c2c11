//! JPEG stream surgery.
//!
//! Pyramidal slide containers store each tile as an abbreviated JPEG stream:
//! the payload carries only the entropy-coded data, while the quantization
//! (DQT) and Huffman (DHT) tables live once per series in the container's
//! `JPEGTables` tag. Before a tile can be decoded or served it has to be
//! stitched back into a standalone stream.
//!
//! # Stitching
//!
//! ```text
//! tables (minus trailing EOI) + APP14 colorspace marker + payload (minus leading SOI)
//! ```
//!
//! The injected APP14 "Adobe" segment pins the color transform so decoders
//! interpret the scan data as YCbCr instead of guessing from component IDs.
//! Without it, stitched tiles render with inverted-looking colors in some
//! decoders.

use bytes::{Bytes, BytesMut};

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Define Huffman Table marker
pub const DHT: [u8; 2] = [0xFF, 0xC4];

/// Define Quantization Table marker
pub const DQT: [u8; 2] = [0xFF, 0xDB];

/// Start Of Scan marker
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Application segment 14 (Adobe) marker
pub const APP14: [u8; 2] = [0xFF, 0xEE];

/// Complete Adobe APP14 segment injected between tables and payload.
///
/// Marker, 14-byte length, "Adobe" identifier, version 100, zero flags, and
/// transform byte 0. This is a fixed property of the container format's tile
/// encoding, not a tunable.
pub const ADOBE_APP14: [u8; 16] = [
    0xFF, 0xEE, // APP14
    0x00, 0x0E, // segment length (14)
    0x41, 0x64, 0x6F, 0x62, 0x65, // "Adobe"
    0x00, 0x64, // version
    0x80, 0x00, // flags0
    0x00, 0x00, // flags1
    0x00, // color transform
];

// =============================================================================
// JPEG Stream Analysis
// =============================================================================

/// Check if JPEG data is an abbreviated stream (missing tables).
///
/// An abbreviated stream starts with SOI but reaches SOS without any DQT or
/// DHT segment in between.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = [data[pos], data[pos + 1]];

        if marker == DQT || marker == DHT {
            return false;
        }
        if marker == SOS {
            return true;
        }

        // Skip over the segment body when the marker carries a length
        if pos + 3 < data.len() && marker[1] != 0x00 && marker[1] != 0xD8 && marker[1] != 0xD9 {
            let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            pos += 2 + length;
        } else {
            pos += 2;
        }
    }

    // No SOS found: inconclusive, treat as not abbreviated
    false
}

/// Check if JPEG data is a complete stream (carries its own tables).
pub fn is_complete_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    data.windows(2).skip(2).any(|w| w == DQT)
}

// =============================================================================
// Tile Stitching
// =============================================================================

/// Stitch a shared table fragment and a tile payload into a standalone JPEG.
///
/// Both inputs must start with SOI; returns `None` otherwise so the caller
/// can flag the container as corrupt. A trailing EOI on the table fragment is
/// stripped when present (writers differ on whether they include it).
///
/// The output is `tables + ADOBE_APP14 + payload[2..]`, which starts with the
/// tables' SOI and ends with the payload's EOI.
pub fn stitch_tile(tables: &[u8], payload: &[u8]) -> Option<Bytes> {
    if tables.len() < 2 || tables[0..2] != SOI {
        return None;
    }
    if payload.len() < 2 || payload[0..2] != SOI {
        return None;
    }

    let tables_end = if tables[tables.len() - 2..] == EOI {
        tables.len() - 2
    } else {
        tables.len()
    };

    let mut out = BytesMut::with_capacity(tables_end + ADOBE_APP14.len() + payload.len() - 2);
    out.extend_from_slice(&tables[..tables_end]);
    out.extend_from_slice(&ADOBE_APP14);
    out.extend_from_slice(&payload[2..]);

    Some(out.freeze())
}

/// Merge a table fragment with an abbreviated stream, without the APP14 fix.
///
/// Used for the overview image, whose stream is decoded in-process rather
/// than handed to external viewers, so no colorspace pinning is needed.
/// Only recognizably abbreviated streams get tables spliced in; complete and
/// unrecognized streams pass through unchanged and fail at decode time if
/// they are junk.
pub fn merge_tables(tables: Option<&[u8]>, data: &[u8]) -> Bytes {
    if !is_abbreviated_stream(data) {
        return Bytes::copy_from_slice(data);
    }

    let tables = match tables {
        Some(t) if !t.is_empty() => t,
        _ => return Bytes::copy_from_slice(data),
    };

    let tables_end = if tables.len() >= 2 && tables[tables.len() - 2..] == EOI {
        tables.len() - 2
    } else {
        tables.len()
    };

    // An abbreviated stream starts with SOI; skip it when splicing
    let mut out = BytesMut::with_capacity(tables_end + data.len() - 2);
    out.extend_from_slice(&tables[..tables_end]);
    out.extend_from_slice(&data[2..]);
    out.freeze()
}

// =============================================================================
// Tests
// =============================================================================
