//! Versioned byte layouts for every sketch kind.
//!
//! Each sketch serializes to a self-describing little-endian buffer:
//! a 4-byte magic tag, a format version byte, the construction parameters,
//! then the register payload. Reading and writing bytes is the caller's
//! concern; this module only defines the layout and the exact size contract
//! (`bytesize` always equals `to_bytes().len()`).
//!
//! MinHash permutation coefficients are never persisted — they are a pure
//! function of `(seed, num_perm)` and are recomputed on load.

use crate::error::{Result, SketchError};

/// Current format version, shared by all sketch layouts.
pub const FORMAT_VERSION: u8 = 1;

/// Magic tag for MinHash buffers.
pub const MINHASH_MAGIC: [u8; 4] = *b"SMMH";

/// Magic tag for b-bit MinHash buffers.
pub const BBIT_MAGIC: [u8; 4] = *b"SMBB";

/// Magic tag for HyperLogLog buffers.
pub const HLL_MAGIC: [u8; 4] = *b"SMHL";

/// Magic tag for HyperLogLog++ buffers.
pub const HLLPP_MAGIC: [u8; 4] = *b"SMHP";

/// Magic tag for MinHash LSH index buffers.
pub const LSH_MAGIC: [u8; 4] = *b"SMLI";

/// Types with a deterministic, versioned byte layout.
pub trait Persistable: Sized {
    /// Serialize to bytes.
    fn to_bytes(&self) -> Vec<u8>;

    /// Deserialize from bytes, validating magic, version, parameters, and
    /// exact buffer length before constructing anything.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;

    /// Exact length of [`Persistable::to_bytes`] output.
    fn bytesize(&self) -> usize;
}

/// Bounds-checked little-endian cursor over a serialized buffer.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                SketchError::Serialization(format!(
                    "truncated buffer: need {} bytes at offset {}, have {}",
                    n,
                    self.pos,
                    self.buf.len() - self.pos
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32> {
        let s = self.take(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub(crate) fn u64_le(&mut self) -> Result<u64> {
        let s = self.take(8)?;
        Ok(u64::from_le_bytes([
            s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
        ]))
    }

    pub(crate) fn f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64_le()?))
    }

    /// Consumes and checks the 4-byte magic tag and version byte.
    pub(crate) fn header(&mut self, magic: &[u8; 4], what: &str) -> Result<()> {
        let tag = self.take(4)?;
        if tag != magic {
            return Err(SketchError::Serialization(format!(
                "bad magic for {what}: expected {magic:?}, got {tag:?}"
            )));
        }
        let version = self.u8()?;
        if version != FORMAT_VERSION {
            return Err(SketchError::Serialization(format!(
                "unsupported {what} format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        Ok(())
    }

    /// Fails unless the buffer has been consumed exactly.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(SketchError::Serialization(format!(
                "{} trailing bytes after payload",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}
