//! Compression selectors.
//!
//! The writer does not implement compression; each selector delegates to
//! its codec crate (`flate2` for gzip/zlib, `snap` for snappy, `zstd` for
//! zstandard). Payloads are compressed per record, which keeps the chunk
//! file appendable and the per-record byte accounting exact.

use std::io::{self, Read, Write};

/// Per-record compression applied inside a chunk file.
///
/// The selector is part of the stream's configuration: every chunk of a
/// stream uses the same compression, and readers must be given the same
/// selector the writer used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store records uncompressed.
    #[default]
    None,
    /// DEFLATE with a gzip wrapper.
    Gzip,
    /// Snappy raw block encoding.
    Snappy,
    /// DEFLATE with a zlib wrapper.
    Zlib,
    /// Zstandard at the default level.
    Zstd,
}

/// Every selector, for parameterized tests and tooling.
pub const ALL_COMPRESSIONS: [Compression; 5] = [
    Compression::None,
    Compression::Gzip,
    Compression::Snappy,
    Compression::Zlib,
    Compression::Zstd,
];

impl Compression {
    /// Stable identifier, stored in manifests and logs.
    pub fn id(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Zlib => "zlib",
            Compression::Zstd => "zstd",
        }
    }

    /// Look up a selector by its identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "none" => Some(Compression::None),
            "gzip" => Some(Compression::Gzip),
            "snappy" => Some(Compression::Snappy),
            "zlib" => Some(Compression::Zlib),
            "zstd" => Some(Compression::Zstd),
            _ => None,
        }
    }

    pub(crate) fn encode(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Compression::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
            Compression::Zlib => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Compression::Zstd => zstd::encode_all(data, 0),
        }
    }

    pub(crate) fn decode(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut decoded = Vec::new();
                flate2::read::GzDecoder::new(data).read_to_end(&mut decoded)?;
                Ok(decoded)
            }
            Compression::Snappy => snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Compression::Zlib => {
                let mut decoded = Vec::new();
                flate2::read::ZlibDecoder::new(data).read_to_end(&mut decoded)?;
                Ok(decoded)
            }
            Compression::Zstd => zstd::decode_all(data),
        }
    }
}
