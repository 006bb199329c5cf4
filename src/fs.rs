//! File-system collaborator seam.
//!
//! Every disk operation the writer performs goes through [`SnapshotFs`].
//! The trait exists for the same reason the storage codec is a trait: it is
//! a seam. Production code uses [`StdFs`]; tests substitute fault-injecting
//! implementations to drive the error paths.
//!
//! The operations listed here are exactly the writer's suspension points:
//! directory creation, existence check, atomic rename, streaming chunk
//! writes, whole-file sentinel writes, and staging cleanup. Failures
//! propagate; nothing is retried here.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writable chunk file handle.
///
/// `sync` must flush all buffered bytes and force them to stable storage;
/// a chunk is only renamed into the committed directory after `sync`
/// returns, which is what makes the rename crash-safe.
pub trait ChunkFile: Write + Send {
    /// Flush buffers and force contents to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

/// File-system operations used by the stream writer.
///
/// Implementations must be `Send + Sync`; one instance is shared between
/// the constructing thread and the background write loop.
pub trait SnapshotFs: Send + Sync {
    /// Recursively create a directory and its parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Atomically move `from` to `to`. Same-volume rename only; this is
    /// the sole mechanism by which a chunk becomes externally visible.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Open a new file for streaming writes, truncating any existing file.
    fn create(&self, path: &Path) -> io::Result<Box<dyn ChunkFile>>;

    /// Write an entire file in one operation (sentinels).
    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Standard-library file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

struct StdChunkFile {
    inner: BufWriter<File>,
}

impl Write for StdChunkFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ChunkFile for StdChunkFile {
    fn sync(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()
    }
}

impl SnapshotFs for StdFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn ChunkFile>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(StdChunkFile {
            inner: BufWriter::new(file),
        }))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}
