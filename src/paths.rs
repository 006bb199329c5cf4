//! Snapshot directory layout and stream sentinels.
//!
//! A snapshot is a portable directory shared by all of its streams:
//!
//! ```text
//! <snapshot root>/
//! ├── chunks/                       # committed chunks, all streams
//! │   ├── chunk_0_0_10              # chunk_<stream>_<chunk>_<elements>
//! │   └── ...
//! └── streams/
//!     └── stream_0/
//!         ├── DONE | ERROR          # terminal sentinel, at most one
//!         └── uncommitted_chunks/   # staging, scoped to the stream
//!             └── chunk_3           # chunk_<chunk index>
//! ```
//!
//! Staging names carry only the chunk index; the committed name is assigned
//! at commit time, once the element count is known. Moving a file from the
//! staging name to the committed name is the single atomic step that makes
//! a chunk externally visible.

use std::path::{Path, PathBuf};

use crate::error::WriteError;
use crate::fs::SnapshotFs;

/// Name of the success sentinel. Always zero bytes.
pub const DONE_FILE_NAME: &str = "DONE";

/// Name of the failure sentinel. Holds the terminal error's message.
pub const ERROR_FILE_NAME: &str = "ERROR";

/// Paths for one stream of a snapshot.
#[derive(Debug, Clone)]
pub struct StreamPaths {
    root: PathBuf,
    stream_index: u64,
}

impl StreamPaths {
    /// Paths rooted at a snapshot directory, for one stream index.
    pub fn new(root: impl AsRef<Path>, stream_index: u64) -> Self {
        StreamPaths {
            root: root.as_ref().to_path_buf(),
            stream_index,
        }
    }

    /// The snapshot root directory.
    pub fn snapshot_root(&self) -> &Path {
        &self.root
    }

    /// Index of this stream within the snapshot.
    pub fn stream_index(&self) -> u64 {
        self.stream_index
    }

    /// Committed chunks of every stream. Pre-created by the caller before
    /// any writer starts.
    pub fn committed_chunks_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    /// Directory owned by this stream, holding its sentinel and staging.
    pub fn stream_dir(&self) -> PathBuf {
        self.root
            .join("streams")
            .join(format!("stream_{}", self.stream_index))
    }

    /// Staging directory for chunks that are still being written. Created
    /// lazily by the writer.
    pub fn uncommitted_chunks_dir(&self) -> PathBuf {
        self.stream_dir().join("uncommitted_chunks")
    }

    /// The `DONE` sentinel path.
    pub fn done_file(&self) -> PathBuf {
        self.stream_dir().join(DONE_FILE_NAME)
    }

    /// The `ERROR` sentinel path.
    pub fn error_file(&self) -> PathBuf {
        self.stream_dir().join(ERROR_FILE_NAME)
    }

    /// Staging path for a chunk that is being written.
    pub fn uncommitted_chunk(&self, chunk_index: u64) -> PathBuf {
        self.uncommitted_chunks_dir()
            .join(format!("chunk_{}", chunk_index))
    }

    /// Committed path for a finished chunk.
    pub fn committed_chunk(&self, chunk_index: u64, num_elements: u64) -> PathBuf {
        self.committed_chunks_dir().join(format!(
            "chunk_{}_{}_{}",
            self.stream_index, chunk_index, num_elements
        ))
    }

    /// Whether a prior run already marked this stream done.
    pub fn stream_completed(&self, fs: &dyn SnapshotFs) -> bool {
        fs.exists(&self.done_file())
    }

    /// Write the `DONE` sentinel.
    pub fn write_done(&self, fs: &dyn SnapshotFs) -> Result<(), WriteError> {
        let path = self.done_file();
        fs.write_file(&path, &[])
            .map_err(|e| WriteError::io("write DONE sentinel", &path, e))
    }

    /// Write the `ERROR` sentinel containing the failure's message.
    pub fn write_error(&self, fs: &dyn SnapshotFs, message: &str) -> Result<(), WriteError> {
        let path = self.error_file();
        fs.write_file(&path, message.as_bytes())
            .map_err(|e| WriteError::io("write ERROR sentinel", &path, e))
    }
}

/// Parsed fields of a committed chunk file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkName {
    /// Stream the chunk belongs to.
    pub stream_index: u64,
    /// Position of the chunk within its stream.
    pub chunk_index: u64,
    /// Elements stored in the chunk.
    pub num_elements: u64,
}

/// Parse a `chunk_<stream>_<chunk>_<elements>` committed chunk file name.
///
/// Returns `None` for anything that does not match the grammar, including
/// staging names.
pub fn parse_committed_chunk_filename(name: &str) -> Option<ChunkName> {
    let rest = name.strip_prefix("chunk_")?;
    let mut parts = rest.split('_');
    let stream_index = parts.next()?.parse().ok()?;
    let chunk_index = parts.next()?.parse().ok()?;
    let num_elements = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ChunkName {
        stream_index,
        chunk_index,
        num_elements,
    })
}
