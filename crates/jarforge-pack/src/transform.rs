//! Payload transforms applied before embedding.
//!
//! The payload is normally the JAR, untouched. A transform can shrink it; the
//! encoding it reports goes into the trailer so the stub knows how to undo it.

use crate::format::PayloadEncoding;
use crate::{PackError, Result};

/// Compression level for zstd (19 = high compression).
pub const ZSTD_LEVEL: i32 = 19;

/// A reversible encoding of the payload bytes.
pub trait PayloadTransform: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Encoding recorded in the trailer.
    fn encoding(&self) -> PayloadEncoding;

    /// Encode the raw JAR bytes. Must be deterministic.
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Recover the raw JAR bytes.
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Embed the JAR as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PayloadTransform for Identity {
    fn name(&self) -> &'static str {
        "none"
    }

    fn encoding(&self) -> PayloadEncoding {
        PayloadEncoding::Raw
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Store the JAR as a single zstd frame.
///
/// JARs are already deflated, so gains are usually modest; stored (level 0)
/// archives and fat JARs with many small entries benefit most.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    /// Create a zstd transform with the given compression level.
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(ZSTD_LEVEL)
    }
}

impl PayloadTransform for Zstd {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encoding(&self) -> PayloadEncoding {
        PayloadEncoding::Zstd
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(bytes, self.level).map_err(|e| PackError::Compression(e.to_string()))
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::decode_all(bytes).map_err(|e| PackError::Compression(e.to_string()))
    }
}

/// Transform that undoes a given payload encoding.
pub fn for_encoding(encoding: PayloadEncoding) -> Box<dyn PayloadTransform> {
    match encoding {
        PayloadEncoding::Raw => Box::new(Identity),
        PayloadEncoding::Zstd => Box::new(Zstd::default()),
    }
}
