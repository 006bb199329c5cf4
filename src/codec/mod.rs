//! Chunk file codec: record framing and pluggable compression.
//!
//! A chunk file is a flat sequence of framed records. Framing and
//! checksumming live in [`record`]; the compression applied to each
//! record's payload is selected by [`Compression`] and delegated entirely
//! to the codec crates. The writer half streams records through an open
//! file handle; the reader half is what downstream consumers (and tests)
//! use to get the elements back.

pub mod compression;
pub mod record;

pub use compression::{Compression, ALL_COMPRESSIONS};
pub use record::{ChunkReadError, RecordReader, RecordWriter, RECORD_HEADER_SIZE};
