//! Cumulative stream writer counters.
//!
//! Counters accumulate over the lifetime of a writer (or the process, for
//! the global cell) and are never reset. Only successful chunk commits feed
//! them: a cancelled or failed run that committed nothing contributes
//! nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;

/// Snapshot of the cumulative commit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotCounters {
    /// Total bytes of committed chunk data.
    pub bytes_committed: u64,
    /// Total chunks committed.
    pub chunks_committed: u64,
}

/// Live counter cells, updated by the write loop.
#[derive(Debug, Default)]
pub(crate) struct CounterCells {
    bytes_committed: AtomicU64,
    chunks_committed: AtomicU64,
}

impl CounterCells {
    pub(crate) fn record_commit(&self, bytes: u64) {
        self.bytes_committed.fetch_add(bytes, Ordering::Relaxed);
        self.chunks_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SnapshotCounters {
        SnapshotCounters {
            bytes_committed: self.bytes_committed.load(Ordering::Relaxed),
            chunks_committed: self.chunks_committed.load(Ordering::Relaxed),
        }
    }
}

static GLOBAL_COUNTERS: Lazy<CounterCells> = Lazy::new(CounterCells::default);

pub(crate) fn global() -> &'static CounterCells {
    &GLOBAL_COUNTERS
}

/// Process-wide cumulative counters across all stream writers.
///
/// Monotonic: deltas between two snapshots only grow while writers commit.
pub fn global_counters() -> SnapshotCounters {
    GLOBAL_COUNTERS.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_commit_accumulates() {
        let cells = CounterCells::default();
        cells.record_commit(100);
        cells.record_commit(28);

        let snapshot = cells.snapshot();
        assert_eq!(snapshot.bytes_committed, 128);
        assert_eq!(snapshot.chunks_committed, 2);
    }

    #[test]
    fn test_global_counters_are_monotonic() {
        let before = global_counters();
        global().record_commit(1);
        let after = global_counters();

        assert!(after.bytes_committed >= before.bytes_committed + 1);
        assert!(after.chunks_committed >= before.chunks_committed + 1);
    }
}
