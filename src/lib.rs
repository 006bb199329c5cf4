//! Crash-safe chunked stream writer for distributed snapshots.
//!
//! One [`StreamWriter`] owns a single stream of a larger snapshot job: it
//! pulls records from a [`RecordSource`] on a dedicated background thread,
//! persists them as immutable, size-bounded chunk files, exposes each
//! finished chunk with an atomic rename, and marks the stream's terminal
//! state with a `DONE`/`ERROR` sentinel file.
//!
//! - **Crash safety**: a chunk only appears in the committed directory
//!   after it has been fully written and fsynced; readers never observe a
//!   partially written chunk.
//! - **Cooperative cancellation**: `cancel()` sets a flag honored at
//!   loop-safe points; no record is ever partially written.
//! - **Exactly-once completion**: the run terminates once, publishing a
//!   memoized terminal state observable through blocking (`wait`) and
//!   non-blocking (`completed`, `status`) queries.
//!
//! What this crate does not do: decide what data to read, coordinate
//! across streams, implement compression algorithms, or retry failed
//! streams. Those belong to the surrounding system.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod codec;
pub mod error;
pub mod fs;
pub mod metrics;
pub mod paths;
pub mod source;
pub mod testing;
pub mod writer;

pub use chunk::ChunkWriter;
pub use codec::{ChunkReadError, Compression, RecordReader, RecordWriter, ALL_COMPRESSIONS};
pub use error::{SourceError, SourceErrorKind, WriteError};
pub use fs::{ChunkFile, SnapshotFs, StdFs};
pub use metrics::{global_counters, SnapshotCounters};
pub use paths::{
    parse_committed_chunk_filename, ChunkName, StreamPaths, DONE_FILE_NAME, ERROR_FILE_NAME,
};
pub use source::{Cardinality, Element, RecordSource, Value};
pub use writer::{StreamStatus, StreamWriter, WriterParams, DEFAULT_MAX_CHUNK_SIZE_BYTES};
