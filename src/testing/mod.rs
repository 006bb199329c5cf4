//! Test support: deterministic record sources, fault injection, and a
//! committed-stream read-back helper.
//!
//! These doubles live in the crate so integration tests and downstream
//! users exercise the writer through the same seams production code uses.

use std::io;
use std::path::Path;

use crate::codec::{ChunkReadError, Compression, RecordReader};
use crate::error::SourceError;
use crate::fs::{ChunkFile, SnapshotFs, StdFs};
use crate::paths::{parse_committed_chunk_filename, StreamPaths};
use crate::source::{Cardinality, Element, RecordSource, Value};

/// Source emitting `0..range` as single-value integer elements.
pub struct RangeSource {
    next: i64,
    range: i64,
}

impl RangeSource {
    /// Source over `0..range`.
    pub fn new(range: i64) -> Self {
        RangeSource { next: 0, range }
    }
}

impl RecordSource for RangeSource {
    fn get_next(&mut self) -> Result<Option<Element>, SourceError> {
        if self.next >= self.range {
            return Ok(None);
        }
        let element = Element::from(self.next);
        self.next += 1;
        Ok(Some(element))
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::Finite(self.range.max(0) as u64)
    }

    fn save(&self) -> Result<Vec<Element>, SourceError> {
        Ok(vec![Element::from(self.next)])
    }

    fn restore(&mut self, checkpoint: &[Element]) -> Result<(), SourceError> {
        match checkpoint.first().map(Element::values) {
            Some([Value::Int(next)]) => {
                self.next = *next;
                Ok(())
            }
            _ => Err(SourceError::invalid_argument(
                "range source checkpoint must be a single integer element",
            )),
        }
    }
}

/// Source yielding a scripted sequence of elements or failures.
pub struct ElementOrErrorSource {
    items: std::vec::IntoIter<Result<Element, SourceError>>,
}

impl ElementOrErrorSource {
    /// Source that replays `items` in order.
    pub fn new(items: Vec<Result<Element, SourceError>>) -> Self {
        ElementOrErrorSource {
            items: items.into_iter(),
        }
    }

    /// Source over a plain element sequence that never fails.
    pub fn from_elements(elements: Vec<Element>) -> Self {
        ElementOrErrorSource::new(elements.into_iter().map(Ok).collect())
    }
}

impl RecordSource for ElementOrErrorSource {
    fn get_next(&mut self) -> Result<Option<Element>, SourceError> {
        self.items.next().transpose()
    }
}

/// Operation for [`FailingFs`] to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingOp {
    /// Fail `create_dir_all`.
    CreateDir,
    /// Fail `rename` (chunk commit).
    Rename,
    /// Fail streaming `create` (chunk open).
    Create,
    /// Fail `write_file` (sentinels).
    WriteFile,
}

/// File system that fails every call to one chosen operation.
///
/// Everything else delegates to [`StdFs`], so a run under `FailingFs`
/// behaves normally until it hits the poisoned operation.
pub struct FailingFs {
    inner: StdFs,
    fail: FailingOp,
}

impl FailingFs {
    /// Fail every `fail` operation with `PermissionDenied`.
    pub fn new(fail: FailingOp) -> Self {
        FailingFs { inner: StdFs, fail }
    }

    fn injected(&self) -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "injected failure")
    }
}

impl SnapshotFs for FailingFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.fail == FailingOp::CreateDir {
            return Err(self.injected());
        }
        self.inner.create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail == FailingOp::Rename {
            return Err(self.injected());
        }
        self.inner.rename(from, to)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn ChunkFile>> {
        if self.fail == FailingOp::Create {
            return Err(self.injected());
        }
        self.inner.create(path)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if self.fail == FailingOp::WriteFile {
            return Err(self.injected());
        }
        self.inner.write_file(path, data)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path)
    }
}

/// Read a stream's committed elements back, chunks concatenated in index
/// order.
///
/// Scans the committed chunks directory, keeps the files whose parsed name
/// matches `stream_index`, and reads them with the stream's compression
/// selector.
pub fn read_stream_elements(
    snapshot_path: &Path,
    stream_index: u64,
    compression: Compression,
) -> Result<Vec<Element>, ChunkReadError> {
    let chunks_dir = StreamPaths::new(snapshot_path, stream_index).committed_chunks_dir();
    let mut chunks = Vec::new();
    for entry in std::fs::read_dir(&chunks_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(parsed) = parse_committed_chunk_filename(name) {
            if parsed.stream_index == stream_index {
                chunks.push((parsed.chunk_index, entry.path()));
            }
        }
    }
    chunks.sort_by_key(|(chunk_index, _)| *chunk_index);

    let mut elements = Vec::new();
    for (_, path) in chunks {
        let mut reader = RecordReader::open(&path, compression)?;
        elements.append(&mut reader.read_all()?);
    }
    Ok(elements)
}
