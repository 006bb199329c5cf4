//! Length-prefixed, checksummed record framing.
//!
//! Each record occupies one frame:
//!
//! ```text
//! +----------------+-----------------+------------------+
//! | length: u32 LE | crc32: u32 LE   | payload          |
//! +----------------+-----------------+------------------+
//! ```
//!
//! where the payload is the record's serialized bytes after compression and
//! the CRC covers the payload. A reader that hits end-of-file exactly on a
//! frame boundary has read the whole chunk; anything else is corruption.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::codec::Compression;
use crate::fs::ChunkFile;
use crate::source::Element;

/// Bytes of frame header preceding each record payload.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Streaming writer for one chunk file.
pub struct RecordWriter {
    out: Box<dyn ChunkFile>,
    compression: Compression,
}

impl RecordWriter {
    /// Wrap an open chunk file handle.
    pub fn new(out: Box<dyn ChunkFile>, compression: Compression) -> Self {
        RecordWriter { out, compression }
    }

    /// Serialize, compress, frame and write one element.
    ///
    /// Returns the framed size in bytes, header included; this is the
    /// number the chunk-size bound is accounted against.
    pub fn write_record(&mut self, element: &Element) -> io::Result<u64> {
        let serialized = bincode::serialize(element)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let payload = self.compression.encode(&serialized)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        self.out.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.out.write_all(&crc.to_le_bytes())?;
        self.out.write_all(&payload)?;

        Ok((RECORD_HEADER_SIZE + payload.len()) as u64)
    }

    /// Flush and force the chunk contents to stable storage.
    pub fn finish(mut self) -> io::Result<()> {
        self.out.sync()
    }
}

/// Errors reading a chunk file back.
#[derive(Debug, thiserror::Error)]
pub enum ChunkReadError {
    /// Underlying file read failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Frame header or checksum did not match the written data.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset of the offending frame.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// Payload did not deserialize into an element.
    #[error("failed to decode record: {0}")]
    Decode(String),
}

/// Streaming reader over one chunk file.
///
/// Must be given the same compression selector the writer used.
pub struct RecordReader<R: Read> {
    input: R,
    compression: Compression,
    offset: u64,
}

impl RecordReader<BufReader<File>> {
    /// Open a chunk file for reading.
    pub fn open(path: &Path, compression: Compression) -> Result<Self, ChunkReadError> {
        let file = File::open(path)?;
        Ok(RecordReader::new(BufReader::new(file), compression))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap any byte stream.
    pub fn new(input: R, compression: Compression) -> Self {
        RecordReader {
            input,
            compression,
            offset: 0,
        }
    }

    /// Read the next element; `Ok(None)` at a clean end of file.
    pub fn read_record(&mut self) -> Result<Option<Element>, ChunkReadError> {
        let (len, expected_crc) = match self.read_frame_header()? {
            Some(header) => header,
            None => return Ok(None),
        };

        let mut payload = vec![0u8; len as usize];
        self.input.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ChunkReadError::Corrupt {
                    offset: self.offset,
                    reason: format!("truncated payload, expected {} bytes", len),
                }
            } else {
                ChunkReadError::Io(e)
            }
        })?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        if hasher.finalize() != expected_crc {
            return Err(ChunkReadError::Corrupt {
                offset: self.offset,
                reason: "checksum mismatch".to_string(),
            });
        }

        let serialized = self
            .compression
            .decode(&payload)
            .map_err(|e| ChunkReadError::Decode(e.to_string()))?;
        let element = bincode::deserialize(&serialized)
            .map_err(|e| ChunkReadError::Decode(e.to_string()))?;

        self.offset += (RECORD_HEADER_SIZE + payload.len()) as u64;
        Ok(Some(element))
    }

    /// Read every remaining element in order.
    pub fn read_all(&mut self) -> Result<Vec<Element>, ChunkReadError> {
        let mut elements = Vec::new();
        while let Some(element) = self.read_record()? {
            elements.push(element);
        }
        Ok(elements)
    }

    /// Returns `None` at a clean end of file, the header fields otherwise.
    fn read_frame_header(&mut self) -> Result<Option<(u32, u32)>, ChunkReadError> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let mut filled = 0;
        while filled < header.len() {
            let n = self.input.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ChunkReadError::Corrupt {
                    offset: self.offset,
                    reason: "truncated record header".to_string(),
                });
            }
            filled += n;
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&header[0..4]);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&header[4..8]);
        Ok(Some((
            u32::from_le_bytes(len_bytes),
            u32::from_le_bytes(crc_bytes),
        )))
    }
}
