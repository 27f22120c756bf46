//! Digest ingestion shared by all sketches.
//!
//! Sketches consume caller-supplied hash digests rather than hashing items
//! themselves (the hash function is the caller's choice). Each sketch reads
//! only the low-order bytes it needs, interpreted little-endian: 4 bytes for
//! MinHash and HyperLogLog, 8 for HyperLogLog++.

use crate::error::{Result, SketchError};

/// Interprets the low 4 bytes of `digest` as a little-endian `u32`.
#[inline]
pub fn low_u32(digest: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = digest
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(SketchError::DigestTooShort {
            needed: 4,
            got: digest.len(),
        })?;
    Ok(u32::from_le_bytes(bytes))
}

/// Interprets the low 8 bytes of `digest` as a little-endian `u64`.
#[inline]
pub fn low_u64(digest: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = digest
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or(SketchError::DigestTooShort {
            needed: 8,
            got: digest.len(),
        })?;
    Ok(u64::from_le_bytes(bytes))
}
