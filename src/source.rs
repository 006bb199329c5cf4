//! Record source abstraction.
//!
//! The writer never inspects record contents: an [`Element`] is an ordered
//! sequence of typed values that only needs to be serializable. The source
//! behind the trait may be an in-memory vector or an arbitrary computation
//! graph; the writer just pulls until the sequence ends or fails.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// One typed scalar within an element.
///
/// Different types are never equal, even for the same "value":
/// `Int(1) != Float(1.0)`, `Bytes(b"x") != String("x")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

/// One serializable record emitted by a source.
///
/// An element is an ordered sequence of typed values with no further
/// structure assumed. Chunk files store elements in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element(Vec<Value>);

impl Element {
    /// Element from a list of values.
    pub fn new(values: Vec<Value>) -> Self {
        Element(values)
    }

    /// The values of this element, in order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl From<i64> for Element {
    fn from(v: i64) -> Self {
        Element(vec![Value::Int(v)])
    }
}

impl From<&str> for Element {
    fn from(v: &str) -> Self {
        Element(vec![Value::String(v.to_string())])
    }
}

/// Reported size of a source.
///
/// The report is advisory: a source's emitted count may not match its
/// declared cardinality, and the writer tolerates that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// The source expects to emit exactly this many records.
    Finite(u64),
    /// The source cannot predict its length.
    Unknown,
}

/// Record-producing source driven by the stream writer.
///
/// `get_next` is pulled from the writer's background thread, so
/// implementations must be `Send`. The `save`/`restore` pair serves an
/// external checkpointing layer; the writer itself never calls them.
pub trait RecordSource: Send {
    /// Pull the next record. `Ok(None)` signals end of sequence; an error
    /// aborts the stream and becomes its terminal status.
    fn get_next(&mut self) -> Result<Option<Element>, SourceError>;

    /// Number of records this source expects to emit.
    fn cardinality(&self) -> Cardinality {
        Cardinality::Unknown
    }

    /// Capture the source position for an external checkpointing layer.
    fn save(&self) -> Result<Vec<Element>, SourceError> {
        Ok(Vec::new())
    }

    /// Restore a position previously captured with [`RecordSource::save`].
    fn restore(&mut self, _checkpoint: &[Element]) -> Result<(), SourceError> {
        Ok(())
    }
}
