//! End-to-end tests for the stream snapshot writer.
//!
//! These tests drive a writer against a real temp directory and verify:
//! 1. Committed chunks reproduce the source sequence, per compression
//! 2. Sentinel files reflect the terminal state exactly once
//! 3. Cancellation stops the run without writing any sentinel
//! 4. Staging files never survive a terminal state
//! 5. Commit counters only grow on successful commits

use std::sync::Arc;

use snapstream::testing::{
    read_stream_elements, ElementOrErrorSource, FailingFs, FailingOp, RangeSource,
};
use snapstream::{
    global_counters, Compression, Element, RecordReader, SourceError, StreamStatus, StreamWriter,
    WriteError, WriterParams, ALL_COMPRESSIONS,
};
use tempfile::TempDir;

/// Temp snapshot root with the committed chunks directory pre-created,
/// which is the caller's responsibility before any writer starts.
fn create_snapshot_root() -> TempDir {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("chunks")).unwrap();
    dir
}

fn range_elements(range: i64) -> Vec<Element> {
    (0..range).map(Element::from).collect()
}

// ============================================================================
// Successful writes
// ============================================================================

#[test]
fn test_write_snapshot_single_chunk() {
    for compression in ALL_COMPRESSIONS {
        let root = create_snapshot_root();
        let params = WriterParams::new(root.path(), 0).with_compression(compression);

        let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(10)));
        assert_eq!(writer.wait(), Ok(true));

        // All ten elements land in one committed chunk; the staging file
        // is gone.
        let committed = params.committed_chunks_dir().join("chunk_0_0_10");
        let mut reader = RecordReader::open(&committed, compression).unwrap();
        assert_eq!(reader.read_all().unwrap(), range_elements(10));
        assert!(!params.uncommitted_chunks_dir().join("chunk_0").exists());

        let counters = writer.counters();
        assert_eq!(counters.chunks_committed, 1);
        assert!(counters.bytes_committed > 0);
    }
}

#[test]
fn test_write_snapshot_one_record_per_chunk() {
    for compression in ALL_COMPRESSIONS {
        let root = create_snapshot_root();
        let params = WriterParams::for_testing(root.path(), 0).with_compression(compression);

        let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(10)));
        assert_eq!(writer.wait(), Ok(true));

        for i in 0..10 {
            let chunk = params
                .committed_chunks_dir()
                .join(format!("chunk_0_{}_1", i));
            let mut reader = RecordReader::open(&chunk, compression).unwrap();
            assert_eq!(reader.read_all().unwrap(), vec![Element::from(i)]);
        }

        // Exactly ten chunks: an exactly-full final chunk must not leave a
        // trailing empty one behind.
        let committed = std::fs::read_dir(params.committed_chunks_dir())
            .unwrap()
            .count();
        assert_eq!(committed, 10);
        assert_eq!(writer.counters().chunks_committed, 10);
    }
}

#[test]
fn test_write_done_file() {
    let root = create_snapshot_root();
    let params = WriterParams::for_testing(root.path(), 0);
    let done = params.stream_dir().join("DONE");
    let error = params.stream_dir().join("ERROR");

    assert!(!done.exists());
    assert!(!error.exists());

    let writer = StreamWriter::new(params, Box::new(RangeSource::new(10)));
    assert_eq!(writer.wait(), Ok(true));

    assert!(done.exists());
    assert_eq!(std::fs::metadata(&done).unwrap().len(), 0);
    assert!(!error.exists());
    assert_eq!(writer.completed(), Ok(true));
    assert_eq!(writer.status(), StreamStatus::Done);
}

#[test]
fn test_empty_stream_commits_one_empty_chunk() {
    let root = create_snapshot_root();
    let params = WriterParams::new(root.path(), 0).with_compression(Compression::Snappy);

    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(0)));
    assert_eq!(writer.wait(), Ok(true));

    let chunk = params.committed_chunks_dir().join("chunk_0_0_0");
    let mut reader = RecordReader::open(&chunk, Compression::Snappy).unwrap();
    assert!(reader.read_all().unwrap().is_empty());
    assert!(params.stream_dir().join("DONE").exists());
}

#[test]
fn test_wait_is_idempotent() {
    let root = create_snapshot_root();
    let writer = StreamWriter::new(
        WriterParams::new(root.path(), 0),
        Box::new(RangeSource::new(3)),
    );

    assert_eq!(writer.wait(), Ok(true));
    assert_eq!(writer.wait(), Ok(true));
    assert_eq!(writer.completed(), Ok(true));
}

#[test]
fn test_stream_index_appears_in_chunk_names() {
    let root = create_snapshot_root();
    let params = WriterParams::new(root.path(), 5);

    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(4)));
    assert_eq!(writer.wait(), Ok(true));

    assert!(params.committed_chunks_dir().join("chunk_5_0_4").exists());
    assert_eq!(
        read_stream_elements(root.path(), 5, Compression::None).unwrap(),
        range_elements(4)
    );
}

// ============================================================================
// Duplicate construction over a finished stream
// ============================================================================

#[test]
fn test_stream_already_completed_is_noop_success() {
    let root = create_snapshot_root();
    let params = WriterParams::new(root.path(), 0);

    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(10)));
    assert_eq!(writer.wait(), Ok(true));

    // The retried run must succeed without consuming its source: this
    // source would fail the stream on its first pull.
    let poisoned = ElementOrErrorSource::new(vec![Err(SourceError::internal(
        "source must not be consumed",
    ))]);
    let duplicate = StreamWriter::new(params.clone(), Box::new(poisoned));
    assert_eq!(duplicate.wait(), Ok(true));

    assert_eq!(
        read_stream_elements(root.path(), 0, Compression::None).unwrap(),
        range_elements(10)
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_source_error_writes_error_file() {
    for compression in ALL_COMPRESSIONS {
        let root = create_snapshot_root();
        let params = WriterParams::for_testing(root.path(), 0).with_compression(compression);
        let done = params.stream_dir().join("DONE");
        let error = params.stream_dir().join("ERROR");

        let source = ElementOrErrorSource::new(vec![
            Ok(Element::from("First element")),
            Err(SourceError::invalid_argument("Invalid argument")),
            Ok(Element::from("Second element")),
            Err(SourceError::aborted("Aborted")),
        ]);
        let writer = StreamWriter::new(params.clone(), Box::new(source));

        let expected = WriteError::from(SourceError::invalid_argument("Invalid argument"));
        assert_eq!(writer.wait(), Err(expected.clone()));
        assert_eq!(writer.completed(), Err(expected.clone()));
        assert_eq!(writer.status(), StreamStatus::Failed(expected));

        assert!(!done.exists());
        let text = std::fs::read_to_string(&error).unwrap();
        assert!(text.contains("Invalid argument"), "{text}");
    }
}

#[test]
fn test_commit_rename_failure_writes_error_file() {
    let root = create_snapshot_root();
    let params = WriterParams::for_testing(root.path(), 0)
        .with_fs(Arc::new(FailingFs::new(FailingOp::Rename)));

    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(10)));
    let err = writer.wait().unwrap_err();
    assert!(matches!(err, WriteError::Io { op: "rename", .. }), "{err}");

    assert!(!params.stream_dir().join("DONE").exists());
    let text = std::fs::read_to_string(params.stream_dir().join("ERROR")).unwrap();
    assert!(text.contains("rename"), "{text}");

    // The staging chunk that failed to commit was discarded.
    assert!(!params.uncommitted_chunks_dir().join("chunk_0").exists());
    assert_eq!(writer.counters().chunks_committed, 0);
}

#[test]
fn test_staging_dir_failure_still_reports_original_error() {
    let root = create_snapshot_root();
    let params = WriterParams::new(root.path(), 0)
        .with_fs(Arc::new(FailingFs::new(FailingOp::CreateDir)));

    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(10)));
    let err = writer.wait().unwrap_err();

    // The ERROR sentinel cannot be written either (its directory is the
    // one that failed to appear); the original error must survive.
    assert!(
        matches!(err, WriteError::Io { op: "create directory", .. }),
        "{err}"
    );
    assert!(!params.stream_dir().join("DONE").exists());
    assert!(!params.stream_dir().join("ERROR").exists());
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancel_before_completion() {
    let root = create_snapshot_root();
    let params = WriterParams::new(root.path(), 0);

    // Effectively unbounded: the run can only end through cancellation.
    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(i64::MAX)));
    writer.cancel();

    assert_eq!(writer.wait(), Err(WriteError::Cancelled));
    assert_eq!(writer.completed(), Err(WriteError::Cancelled));
    assert_eq!(writer.status(), StreamStatus::Cancelled);

    // No sentinel after cancellation, and nothing was committed.
    assert!(!params.stream_dir().join("DONE").exists());
    assert!(!params.stream_dir().join("ERROR").exists());
    assert_eq!(writer.counters().bytes_committed, 0);
    assert!(!params.uncommitted_chunks_dir().join("chunk_0").exists());
}

#[test]
fn test_cancel_is_idempotent() {
    let root = create_snapshot_root();
    let writer = StreamWriter::new(
        WriterParams::new(root.path(), 0),
        Box::new(RangeSource::new(i64::MAX)),
    );

    writer.cancel();
    writer.cancel();

    assert_eq!(writer.wait(), Err(WriteError::Cancelled));
    assert_eq!(writer.wait(), Err(WriteError::Cancelled));
}

#[test]
fn test_cancel_after_completion_does_not_rewrite_history() {
    let root = create_snapshot_root();
    let params = WriterParams::new(root.path(), 0);

    let writer = StreamWriter::new(params.clone(), Box::new(RangeSource::new(5)));
    assert_eq!(writer.wait(), Ok(true));

    writer.cancel();
    assert_eq!(writer.completed(), Ok(true));
    assert!(params.stream_dir().join("DONE").exists());
}

// ============================================================================
// Counters
// ============================================================================

#[test]
fn test_commit_counters() {
    let before = global_counters();

    let root = create_snapshot_root();
    let writer = StreamWriter::new(
        WriterParams::new(root.path(), 0),
        Box::new(RangeSource::new(10)),
    );
    assert_eq!(writer.wait(), Ok(true));

    // Ten uncompressed i64 elements occupy at least 80 bytes of record
    // data.
    let counters = writer.counters();
    assert!(counters.bytes_committed >= 80, "{counters:?}");
    assert_eq!(counters.chunks_committed, 1);

    // The same commits feed the process-wide cell; other writers in this
    // process only push the delta higher.
    let after = global_counters();
    assert!(after.bytes_committed >= before.bytes_committed + counters.bytes_committed);
    assert!(after.chunks_committed >= before.chunks_committed + 1);
}
