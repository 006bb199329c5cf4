//! Error taxonomy for the stream snapshot writer.
//!
//! Three categories cover every way a stream can fail:
//!
//! - [`SourceError`]: propagated verbatim from the record source
//! - [`WriteError::Io`]: file-system collaborator failures
//! - [`WriteError::Cancelled`]: synthesized when `cancel()` was requested
//!
//! All variants are `Clone` so the memoized terminal result can be returned
//! from every `wait()`/`completed()` call without re-running the stream.

use std::path::{Path, PathBuf};

/// Failure category reported by a record source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The source rejected its own input or configuration.
    InvalidArgument,
    /// The source gave up mid-sequence.
    Aborted,
    /// The source was asked for records past its end.
    OutOfRange,
    /// Any other source-side failure.
    Internal,
}

/// Error propagated verbatim from the record source.
///
/// The message is surfaced unchanged in the `ERROR` sentinel so operators
/// can see the triggering failure without access to process logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SourceError {
    /// Failure category.
    pub kind: SourceErrorKind,
    /// Human-readable failure text.
    pub message: String,
}

impl SourceError {
    /// Invalid-argument failure.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::InvalidArgument,
            message: message.into(),
        }
    }

    /// Aborted failure.
    pub fn aborted(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::Aborted,
            message: message.into(),
        }
    }

    /// Out-of-range failure.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::OutOfRange,
            message: message.into(),
        }
    }

    /// Internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::Internal,
            message: message.into(),
        }
    }
}

/// Terminal error of a stream write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// Record source failure, propagated verbatim.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// File-system collaborator failure.
    #[error("{op} failed for {path}: {message}")]
    Io {
        /// Operation that failed (e.g. `"rename"`).
        op: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error text.
        message: String,
    },

    /// The stream was cancelled before reaching a natural terminal state.
    #[error("stream snapshot writer was cancelled")]
    Cancelled,
}

impl WriteError {
    /// Convert an `std::io::Error` at the collaborator seam.
    pub(crate) fn io(op: &'static str, path: impl AsRef<Path>, err: std::io::Error) -> Self {
        WriteError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Whether this error is the cancellation sentinel.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WriteError::Cancelled)
    }
}
