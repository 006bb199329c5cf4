//! Chunk accumulation and finalization.

use std::path::{Path, PathBuf};

use crate::codec::{Compression, RecordWriter};
use crate::error::WriteError;
use crate::fs::SnapshotFs;
use crate::source::Element;

/// Accumulates one chunk file in the staging directory.
///
/// Tracks the framed byte size of everything written so the orchestrator
/// can enforce the soft chunk-size bound, and the element count that names
/// the committed file. The bound is the orchestrator's business: a chunk
/// writer accepts records until told to finish.
pub struct ChunkWriter {
    path: PathBuf,
    writer: RecordWriter,
    chunk_bytes: u64,
    num_elements: u64,
}

impl ChunkWriter {
    /// Open a staging chunk file through the file-system collaborator.
    pub fn open(
        fs: &dyn SnapshotFs,
        path: &Path,
        compression: Compression,
    ) -> Result<Self, WriteError> {
        let out = fs
            .create(path)
            .map_err(|e| WriteError::io("create chunk", path, e))?;
        Ok(ChunkWriter {
            path: path.to_path_buf(),
            writer: RecordWriter::new(out, compression),
            chunk_bytes: 0,
            num_elements: 0,
        })
    }

    /// Append one record.
    ///
    /// Returns this record's framed size in bytes. A record is written
    /// whole or not at all; the size bound is only consulted afterwards.
    pub fn write_record(&mut self, element: &Element) -> Result<u64, WriteError> {
        let written = self
            .writer
            .write_record(element)
            .map_err(|e| WriteError::io("write record", &self.path, e))?;
        self.chunk_bytes += written;
        self.num_elements += 1;
        Ok(written)
    }

    /// Framed bytes accumulated so far.
    pub fn chunk_bytes(&self) -> u64 {
        self.chunk_bytes
    }

    /// Elements written so far.
    pub fn num_elements(&self) -> u64 {
        self.num_elements
    }

    /// The staging file path this chunk is being written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and force the staging file to stable storage.
    ///
    /// Returns `(chunk_bytes, num_elements)` for the commit step. The file
    /// is safe to rename once this returns.
    pub fn finish(self) -> Result<(u64, u64), WriteError> {
        self.writer
            .finish()
            .map_err(|e| WriteError::io("finalize chunk", &self.path, e))?;
        Ok((self.chunk_bytes, self.num_elements))
    }
}
