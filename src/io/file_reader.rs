//! Local-file range reader.
//!
//! Containers are served from the local filesystem, so the reader wraps a
//! `std::fs::File` and uses positioned reads. Positioned reads do not move a
//! shared cursor, which keeps the reader usable behind a shared reference;
//! serialization of tile reads against one container is handled one layer up
//! by the engine's I/O guard.

use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

use super::range_reader::RangeReader;

/// Range reader backed by a local file.
pub struct FileRangeReader {
    file: File,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open a container file for range reads.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `Open` for any other open failure (permissions, not a file, ...)
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.to_string_lossy().into_owned();

        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IoError::NotFound(identifier.clone())
            } else {
                IoError::Open {
                    path: identifier.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let size = file
            .metadata()
            .map_err(|e| IoError::Open {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();

        Ok(Self {
            file,
            size,
            identifier,
        })
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset.saturating_add(len as u64) > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len];
        let mut filled = 0;

        // read_at may return short reads, loop until the buffer is full
        while filled < len {
            let n = self
                .read_at(&mut buf[filled..], offset + filled as u64)
                .map_err(|e| IoError::Read(e.to_string()))?;
            if n == 0 {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: self.size,
                });
            }
            filled += n;
        }

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
