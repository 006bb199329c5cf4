//! Stream snapshot writer orchestration.
//!
//! A [`StreamWriter`] owns one stream's single execution: a dedicated
//! background thread pulls records from the source, accumulates them into
//! staging chunk files, and commits each finished chunk with an atomic
//! rename. The run ends exactly once, in one of three ways:
//!
//! - success: the final chunk is committed and `DONE` is written
//! - failure: the run aborts, the in-progress chunk is discarded, and
//!   `ERROR` is written with the failure's message
//! - cancellation: the run stops at the next loop-safe point and writes
//!   no sentinel at all
//!
//! The terminal state is published once and memoized; `wait()` and
//! `completed()` observe the same result forever after.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::chunk::ChunkWriter;
use crate::codec::Compression;
use crate::error::WriteError;
use crate::fs::{SnapshotFs, StdFs};
use crate::metrics::{self, CounterCells, SnapshotCounters};
use crate::paths::StreamPaths;
use crate::source::{Element, RecordSource};

/// Default soft bound on a chunk's byte size (2 GiB).
pub const DEFAULT_MAX_CHUNK_SIZE_BYTES: u64 = 2 * (1u64 << 30);

/// Immutable configuration for one stream writer.
#[derive(Clone)]
pub struct WriterParams {
    /// Snapshot root directory shared by all streams of the job. The
    /// committed chunks directory under it must exist before the writer
    /// starts.
    pub snapshot_path: PathBuf,
    /// Index of this stream within the snapshot job.
    pub stream_index: u64,
    /// Compression applied to chunk records.
    pub compression: Compression,
    /// Soft bound on a chunk's byte size, checked after each full record.
    pub max_chunk_size_bytes: u64,
    /// File-system collaborator.
    pub fs: Arc<dyn SnapshotFs>,
}

impl WriterParams {
    /// Params with default compression, chunk size, and the standard
    /// file system.
    pub fn new(snapshot_path: impl Into<PathBuf>, stream_index: u64) -> Self {
        WriterParams {
            snapshot_path: snapshot_path.into(),
            stream_index,
            compression: Compression::default(),
            max_chunk_size_bytes: DEFAULT_MAX_CHUNK_SIZE_BYTES,
            fs: Arc::new(StdFs),
        }
    }

    /// Set the compression selector (builder pattern).
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the soft chunk-size bound (builder pattern).
    pub fn with_max_chunk_size(mut self, bytes: u64) -> Self {
        self.max_chunk_size_bytes = bytes;
        self
    }

    /// Substitute the file-system collaborator (builder pattern).
    pub fn with_fs(mut self, fs: Arc<dyn SnapshotFs>) -> Self {
        self.fs = fs;
        self
    }

    /// Params forcing one record per chunk, for tests that need many
    /// small chunks.
    pub fn for_testing(snapshot_path: impl Into<PathBuf>, stream_index: u64) -> Self {
        WriterParams::new(snapshot_path, stream_index).with_max_chunk_size(1)
    }

    /// Directory holding committed chunks for the whole snapshot.
    pub fn committed_chunks_dir(&self) -> PathBuf {
        self.paths().committed_chunks_dir()
    }

    /// Directory owned by this stream (sentinels live here).
    pub fn stream_dir(&self) -> PathBuf {
        self.paths().stream_dir()
    }

    /// Staging directory for this stream's in-progress chunks.
    pub fn uncommitted_chunks_dir(&self) -> PathBuf {
        self.paths().uncommitted_chunks_dir()
    }

    pub(crate) fn paths(&self) -> StreamPaths {
        StreamPaths::new(&self.snapshot_path, self.stream_index)
    }
}

impl fmt::Debug for WriterParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterParams")
            .field("snapshot_path", &self.snapshot_path)
            .field("stream_index", &self.stream_index)
            .field("compression", &self.compression)
            .field("max_chunk_size_bytes", &self.max_chunk_size_bytes)
            .finish_non_exhaustive()
    }
}

/// Tagged terminal state of a stream's single execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// The background execution has not finished yet.
    Pending,
    /// Every record was committed and the `DONE` sentinel written.
    Done,
    /// The execution aborted; the `ERROR` sentinel holds the message.
    Failed(WriteError),
    /// `cancel()` stopped the execution; no sentinel was written.
    Cancelled,
}

/// State shared between the handle and the background thread.
struct Shared {
    status: Mutex<StreamStatus>,
    finished: Condvar,
    cancelled: AtomicBool,
    counters: CounterCells,
}

/// Writes one stream of a distributed snapshot on a background thread.
///
/// Construction starts the write immediately; the constructing thread only
/// blocks if it calls [`wait`](StreamWriter::wait). Dropping the writer
/// joins the background thread without cancelling it; call
/// [`cancel`](StreamWriter::cancel) first for prompt teardown.
pub struct StreamWriter {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamWriter {
    /// Start writing the stream immediately.
    pub fn new(params: WriterParams, source: Box<dyn RecordSource>) -> Self {
        let shared = Arc::new(Shared {
            status: Mutex::new(StreamStatus::Pending),
            finished: Condvar::new(),
            cancelled: AtomicBool::new(false),
            counters: CounterCells::default(),
        });

        let task = WriteTask {
            paths: params.paths(),
            params,
            source,
            shared: Arc::clone(&shared),
            chunk: None,
            chunk_index: 0,
            chunks_committed: 0,
        };
        let handle = thread::Builder::new()
            .name(format!("snapstream-{}", task.paths.stream_index()))
            .spawn(move || task.run())
            .expect("failed to spawn stream writer thread");

        StreamWriter {
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Block until the stream reaches a terminal state.
    ///
    /// Returns `Ok(true)` on success, the terminal error otherwise
    /// (including [`WriteError::Cancelled`] after a `cancel()`).
    /// Idempotent: repeated calls return the memoized result without
    /// re-running the stream.
    pub fn wait(&self) -> Result<bool, WriteError> {
        {
            let mut status = self.shared.status.lock();
            while matches!(*status, StreamStatus::Pending) {
                self.shared.finished.wait(&mut status);
            }
        }

        // Reap the worker; later calls and drop see None.
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        self.completed()
    }

    /// Request cooperative termination.
    ///
    /// Returns immediately; effective at most once. The flag is honored at
    /// loop-safe points, so an in-flight record write is never interrupted.
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::Relaxed) {
            info!("stream writer cancellation requested");
        }
    }

    /// Non-blocking completion probe.
    ///
    /// `Ok(false)` while the stream is still running; afterwards, the
    /// identical memoized terminal result that [`wait`](StreamWriter::wait)
    /// returns.
    pub fn completed(&self) -> Result<bool, WriteError> {
        match &*self.shared.status.lock() {
            StreamStatus::Pending => Ok(false),
            StreamStatus::Done => Ok(true),
            StreamStatus::Failed(err) => Err(err.clone()),
            StreamStatus::Cancelled => Err(WriteError::Cancelled),
        }
    }

    /// Current execution state without blocking.
    pub fn status(&self) -> StreamStatus {
        self.shared.status.lock().clone()
    }

    /// Cumulative commit counters for this writer. The same commits also
    /// feed the process-wide [`global_counters`](crate::global_counters).
    pub fn counters(&self) -> SnapshotCounters {
        self.shared.counters.snapshot()
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Single-run write loop, owned by the background thread.
struct WriteTask {
    params: WriterParams,
    paths: StreamPaths,
    source: Box<dyn RecordSource>,
    shared: Arc<Shared>,
    chunk: Option<ChunkWriter>,
    chunk_index: u64,
    chunks_committed: u64,
}

impl WriteTask {
    fn run(mut self) {
        let status = if self.paths.stream_completed(self.params.fs.as_ref()) {
            debug!(
                stream_index = self.paths.stream_index(),
                "stream already completed; skipping write"
            );
            StreamStatus::Done
        } else {
            let result = self.write_stream();
            self.finalize(result)
        };

        let mut slot = self.shared.status.lock();
        *slot = status;
        self.shared.finished.notify_all();
    }

    fn cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Relaxed)
    }

    fn fs(&self) -> &dyn SnapshotFs {
        self.params.fs.as_ref()
    }

    fn write_stream(&mut self) -> Result<(), WriteError> {
        let staging = self.paths.uncommitted_chunks_dir();
        self.fs()
            .create_dir_all(&staging)
            .map_err(|e| WriteError::io("create directory", &staging, e))?;

        info!(
            path = %self.paths.snapshot_root().display(),
            stream_index = self.paths.stream_index(),
            compression = self.params.compression.id(),
            "started writing stream"
        );

        loop {
            if self.cancelled() {
                return Err(WriteError::Cancelled);
            }
            match self.source.get_next()? {
                Some(element) => self.write_record(&element)?,
                None => {
                    self.commit_final_chunk()?;
                    return Ok(());
                }
            }
        }
    }

    /// Append one record, committing the chunk when it crosses the soft
    /// size bound. The bound is checked only after the record is fully
    /// written; records are never split across chunks.
    fn write_record(&mut self, element: &Element) -> Result<(), WriteError> {
        let mut chunk = match self.chunk.take() {
            Some(chunk) => chunk,
            None => ChunkWriter::open(
                self.params.fs.as_ref(),
                &self.paths.uncommitted_chunk(self.chunk_index),
                self.params.compression,
            )?,
        };

        chunk.write_record(element)?;

        if chunk.chunk_bytes() >= self.params.max_chunk_size_bytes {
            self.commit_chunk(chunk)
        } else {
            self.chunk = Some(chunk);
            Ok(())
        }
    }

    /// Commit whatever is in progress at end of sequence. A stream with no
    /// records still publishes one empty chunk; a stream whose last record
    /// exactly filled a chunk does not get a trailing empty one.
    fn commit_final_chunk(&mut self) -> Result<(), WriteError> {
        match self.chunk.take() {
            Some(chunk) => self.commit_chunk(chunk),
            None if self.chunks_committed == 0 => {
                let chunk = ChunkWriter::open(
                    self.params.fs.as_ref(),
                    &self.paths.uncommitted_chunk(self.chunk_index),
                    self.params.compression,
                )?;
                self.commit_chunk(chunk)
            }
            None => Ok(()),
        }
    }

    /// Finalize the staging file and atomically expose it under its
    /// committed name. The rename is the only step that makes the chunk
    /// visible to readers.
    fn commit_chunk(&mut self, chunk: ChunkWriter) -> Result<(), WriteError> {
        let staged = chunk.path().to_path_buf();
        let (chunk_bytes, num_elements) = chunk.finish()?;

        let committed = self.paths.committed_chunk(self.chunk_index, num_elements);
        self.fs()
            .rename(&staged, &committed)
            .map_err(|e| WriteError::io("rename", &staged, e))?;

        self.shared.counters.record_commit(chunk_bytes);
        metrics::global().record_commit(chunk_bytes);

        debug!(
            chunk_index = self.chunk_index,
            num_elements,
            chunk_bytes,
            path = %committed.display(),
            "committed chunk"
        );

        self.chunk_index += 1;
        self.chunks_committed += 1;
        Ok(())
    }

    /// Turn the loop result into the terminal state, writing the sentinel
    /// it calls for. Cancellation wins over any failure that raced it and
    /// writes no sentinel.
    fn finalize(&mut self, result: Result<(), WriteError>) -> StreamStatus {
        if self.cancelled() {
            self.discard_staging_chunk();
            info!(
                stream_index = self.paths.stream_index(),
                "stream write cancelled"
            );
            return StreamStatus::Cancelled;
        }

        let result = result.and_then(|()| self.paths.write_done(self.fs()));
        match result {
            Ok(()) => {
                info!(
                    stream_index = self.paths.stream_index(),
                    chunks = self.chunks_committed,
                    "stream completed"
                );
                StreamStatus::Done
            }
            Err(err) => {
                self.discard_staging_chunk();
                // Best effort; the original error is never masked.
                if let Err(sentinel_err) = self.paths.write_error(self.fs(), &err.to_string()) {
                    warn!(error = %sentinel_err, "failed to write ERROR sentinel");
                }
                warn!(
                    error = %err,
                    stream_index = self.paths.stream_index(),
                    "stream write failed"
                );
                StreamStatus::Failed(err)
            }
        }
    }

    /// Drop the open chunk handle, then unlink its staging file. Covers
    /// both an open chunk and one abandoned mid-write.
    fn discard_staging_chunk(&mut self) {
        self.chunk = None;
        let path = self.paths.uncommitted_chunk(self.chunk_index);
        if self.fs().exists(&path) {
            if let Err(err) = self.fs().remove_file(&path) {
                warn!(path = %path.display(), error = %err, "failed to remove staging chunk");
            }
        }
    }
}
