//! TIFF tag value reading.
//!
//! Values can be stored either inline in the IFD entry (for small values) or
//! at an offset in the file (for larger values like the tile offset arrays).
//! Array values are fetched with a single range request per array.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads tag values from a TIFF file.
///
/// Combines a RangeReader with header information so values are read
/// respecting the file's byte order and format.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read the raw bytes of an entry's value.
    ///
    /// Inline values are taken from the entry itself; offset values are
    /// fetched from the file.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            let bytes = self.reader.read_exact_at(offset, size as usize).await?;
            Ok(bytes)
        }
    }

    /// Read a single u32 scalar, converting Short as needed.
    pub async fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }

        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: "scalar",
                message: format!("tag {}: expected count 1, got {}", entry.tag_id, entry.count),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let byte_order = self.header.byte_order;

        match field_type {
            FieldType::Short => Ok(byte_order.read_u16(&bytes) as u32),
            FieldType::Long => Ok(byte_order.read_u32(&bytes)),
            _ => Err(TiffError::InvalidTagValue {
                tag: "scalar",
                message: format!(
                    "tag {}: expected Short or Long, got {:?}",
                    entry.tag_id, field_type
                ),
            }),
        }
    }

    /// Read an array of u64 values.
    ///
    /// This is the primary method for TileOffsets, TileByteCounts, and the
    /// strip equivalents. Short, Long, and Long8 elements are all widened
    /// to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        let byte_order = self.header.byte_order;

        let mut values = Vec::with_capacity(count);

        match field_type {
            FieldType::Short => {
                for i in 0..count {
                    values.push(byte_order.read_u16(&bytes[i * 2..]) as u64);
                }
            }
            FieldType::Long => {
                for i in 0..count {
                    values.push(byte_order.read_u32(&bytes[i * 4..]) as u64);
                }
            }
            FieldType::Long8 => {
                for i in 0..count {
                    values.push(byte_order.read_u64(&bytes[i * 8..]));
                }
            }
            _ => {
                return Err(TiffError::InvalidTagValue {
                    tag: "array",
                    message: format!(
                        "tag {}: expected Short, Long, or Long8, got {:?}",
                        entry.tag_id, field_type
                    ),
                });
            }
        }

        Ok(values)
    }

    /// Read a null-terminated ASCII string value.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if field_type != FieldType::Ascii {
            return Err(TiffError::InvalidTagValue {
                tag: "string",
                message: format!(
                    "tag {}: expected Ascii, got {:?}",
                    entry.tag_id, field_type
                ),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read raw bytes for UNDEFINED or opaque data (JPEGTables).
    pub async fn read_raw_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        self.read_bytes(entry).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoError;
    use async_trait::async_trait;

    struct MockReader {
        data: Vec<u8>,
    }

    #[async_trait]
    impl RangeReader for MockReader {
        async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
            let start = offset as usize;
            let end = start + len;
            if end > self.data.len() {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: self.data.len() as u64,
                });
            }
            Ok(Bytes::copy_from_slice(&self.data[start..end]))
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }

        fn identifier(&self) -> &str {
            "mock://test"
        }
    }

    fn make_header() -> TiffHeader {
        TiffHeader {
            byte_order: ByteOrder::LittleEndian,
            is_bigtiff: false,
            first_ifd_offset: 8,
        }
    }

    fn inline_entry(tag_id: u16, typ: FieldType, typ_raw: u16, value_bytes: [u8; 4]) -> IfdEntry {
        IfdEntry {
            tag_id,
            field_type: Some(typ),
            field_type_raw: typ_raw,
            count: 1,
            value_offset_bytes: value_bytes.to_vec(),
            is_inline: true,
        }
    }

    #[tokio::test]
    async fn test_read_bytes_inline() {
        let reader = MockReader { data: vec![0; 64] };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = inline_entry(256, FieldType::Short, 3, [0x00, 0x04, 0x00, 0x00]);
        let bytes = values.read_bytes(&entry).await.unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x04]);
    }

    #[tokio::test]
    async fn test_read_bytes_offset() {
        let mut data = vec![0u8; 100];
        data[50..54].copy_from_slice(&[0xAB, 0xCD, 0xEF, 0x12]);

        let reader = MockReader { data };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = IfdEntry {
            tag_id: 256,
            field_type: Some(FieldType::Long),
            field_type_raw: 4,
            count: 1,
            value_offset_bytes: vec![0x32, 0x00, 0x00, 0x00], // offset 50
            is_inline: false,
        };

        let bytes = values.read_bytes(&entry).await.unwrap();
        assert_eq!(&bytes[..], &[0xAB, 0xCD, 0xEF, 0x12]);
    }

    #[tokio::test]
    async fn test_read_u32_inline() {
        let reader = MockReader { data: vec![0; 64] };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = inline_entry(256, FieldType::Long, 4, 50_000u32.to_le_bytes());
        assert_eq!(values.read_u32(&entry).await.unwrap(), 50_000);
    }

    #[tokio::test]
    async fn test_read_u64_array_long() {
        // Tile offsets at file offset 100: 5 LONG values
        let mut data = vec![0u8; 200];
        for (i, val) in [1000u32, 2000, 3000, 4000, 5000].iter().enumerate() {
            let pos = 100 + i * 4;
            data[pos..pos + 4].copy_from_slice(&val.to_le_bytes());
        }

        let reader = MockReader { data };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = IfdEntry {
            tag_id: 324, // TileOffsets
            field_type: Some(FieldType::Long),
            field_type_raw: 4,
            count: 5,
            value_offset_bytes: vec![0x64, 0x00, 0x00, 0x00], // offset 100
            is_inline: false,
        };

        let result = values.read_u64_array(&entry).await.unwrap();
        assert_eq!(result, vec![1000, 2000, 3000, 4000, 5000]);
    }

    #[tokio::test]
    async fn test_read_u64_array_short_inline() {
        let reader = MockReader { data: vec![0; 64] };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        // Two SHORT values fit in the 4-byte inline field
        let entry = IfdEntry {
            tag_id: 279,
            field_type: Some(FieldType::Short),
            field_type_raw: 3,
            count: 2,
            value_offset_bytes: vec![0x64, 0x00, 0xC8, 0x00], // 100, 200
            is_inline: true,
        };

        let result = values.read_u64_array(&entry).await.unwrap();
        assert_eq!(result, vec![100, 200]);
    }

    #[tokio::test]
    async fn test_read_string() {
        let mut data = vec![0u8; 100];
        let desc = b"Aperio Image\0";
        data[20..20 + desc.len()].copy_from_slice(desc);

        let reader = MockReader { data };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = IfdEntry {
            tag_id: 270, // ImageDescription
            field_type: Some(FieldType::Ascii),
            field_type_raw: 2,
            count: desc.len() as u64,
            value_offset_bytes: vec![0x14, 0x00, 0x00, 0x00], // offset 20
            is_inline: false,
        };

        assert_eq!(values.read_string(&entry).await.unwrap(), "Aperio Image");
    }

    #[tokio::test]
    async fn test_read_raw_bytes_jpeg_tables() {
        let mut data = vec![0u8; 100];
        data[30..36].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xDB, 0xFF, 0xD9]);

        let reader = MockReader { data };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = IfdEntry {
            tag_id: 347, // JPEGTables
            field_type: Some(FieldType::Undefined),
            field_type_raw: 7,
            count: 6,
            value_offset_bytes: vec![0x1E, 0x00, 0x00, 0x00], // offset 30
            is_inline: false,
        };

        let result = values.read_raw_bytes(&entry).await.unwrap();
        assert_eq!(&result[..], &[0xFF, 0xD8, 0xFF, 0xDB, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn test_unknown_field_type() {
        let reader = MockReader { data: vec![0; 64] };
        let header = make_header();
        let values = ValueReader::new(&reader, &header);

        let entry = IfdEntry {
            tag_id: 256,
            field_type: None,
            field_type_raw: 99,
            count: 1,
            value_offset_bytes: vec![0; 4],
            is_inline: false,
        };

        let result = values.read_bytes(&entry).await;
        assert!(matches!(result, Err(TiffError::UnknownFieldType(99))));
    }
}
