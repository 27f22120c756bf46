//! b-bit MinHash: a compressed, compare-only projection of a MinHash.
//!
//! Keeping only the low `b` bits of every register shrinks the sketch by a
//! factor of `64 / b` at a quantifiable cost in estimator variance. Truncated
//! registers collide spuriously with probability `2^{-b}` even for unrelated
//! sets, so the raw collision rate overestimates Jaccard; the estimator
//! removes the expected spurious rate under independence:
//! `(c − 2^{-b}) / (1 − 2^{-b})`.
//!
//! A b-bit sketch carries no permutation tables: it cannot be merged or
//! digested into, only compared against another projection with identical
//! `(b, num_perm, seed)`.
//!
//! Reference: Li & König (2010). "b-Bit Minwise Hashing".

use crate::error::{Result, SketchError};
use crate::minhash::MinHash;
use crate::persistence::{ByteReader, Persistable, BBIT_MAGIC, FORMAT_VERSION};

/// Default bit width per register.
pub const DEFAULT_B: u8 = 1;

/// Lossy low-bits projection of a [`MinHash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BBitMinHash {
    b: u8,
    seed: u32,
    values: Vec<u64>,
}

impl BBitMinHash {
    /// Projects `source` onto the low `b` bits per register.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `b` is outside
    /// `[1, 64]`.
    pub fn new(b: u8, source: &MinHash) -> Result<Self> {
        if b == 0 || b > 64 {
            return Err(SketchError::InvalidParameter(
                "b must be in the inclusive range [1, 64]".into(),
            ));
        }
        let mask = low_bits_mask(b);
        Ok(Self {
            b,
            seed: source.seed(),
            values: source.hashvalues().iter().map(|&h| h & mask).collect(),
        })
    }

    /// Bits kept per register.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Seed of the source permutation family.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of registers.
    pub fn num_perm(&self) -> usize {
        self.values.len()
    }

    /// Read-only view of the truncated registers.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Estimates Jaccard similarity from truncated-register collisions,
    /// corrected for the `2^{-b}` spurious collision rate and clamped at 0.
    ///
    /// # Errors
    /// Returns [`SketchError::Incompatible`] on mismatched
    /// `(b, num_perm, seed)`.
    pub fn jaccard(&self, other: &Self) -> Result<f64> {
        if self.b != other.b {
            return Err(SketchError::Incompatible(format!(
                "jaccard requires matching b: {} vs {}",
                self.b, other.b
            )));
        }
        if self.num_perm() != other.num_perm() {
            return Err(SketchError::Incompatible(format!(
                "jaccard requires matching num_perm: {} vs {}",
                self.num_perm(),
                other.num_perm()
            )));
        }
        if self.seed != other.seed {
            return Err(SketchError::Incompatible(format!(
                "jaccard requires matching seed: {} vs {}",
                self.seed, other.seed
            )));
        }

        let collisions = self
            .values
            .iter()
            .zip(other.values.iter())
            .filter(|(a, b)| a == b)
            .count();
        let c = collisions as f64 / self.num_perm() as f64;
        let spurious = 0.5f64.powi(i32::from(self.b));
        Ok(((c - spurious) / (1.0 - spurious)).max(0.0))
    }
}

impl Persistable for BBitMinHash {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.bytesize());
        buf.extend_from_slice(&BBIT_MAGIC);
        buf.push(FORMAT_VERSION);
        buf.push(self.b);
        buf.extend_from_slice(&self.seed.to_le_bytes());
        buf.extend_from_slice(&(self.num_perm() as u32).to_le_bytes());
        buf.extend_from_slice(&pack_bits(&self.values, self.b));
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        r.header(&BBIT_MAGIC, "b-bit minhash")?;
        let b = r.u8()?;
        if b == 0 || b > 64 {
            return Err(SketchError::Serialization(format!(
                "bit width {b} outside [1, 64]"
            )));
        }
        let seed = r.u32_le()?;
        let num_perm = r.u32_le()? as usize;
        if num_perm == 0 {
            return Err(SketchError::Serialization(
                "num_perm must be at least 1".into(),
            ));
        }
        let packed_len = packed_size(num_perm, b);
        let packed = r.take(packed_len)?;
        let values = unpack_bits(packed, num_perm, b);
        r.finish()?;
        Ok(Self { b, seed, values })
    }

    fn bytesize(&self) -> usize {
        // magic + version + b + seed + num_perm + packed registers
        4 + 1 + 1 + 4 + 4 + packed_size(self.num_perm(), self.b)
    }
}

#[inline]
fn low_bits_mask(b: u8) -> u64 {
    if b == 64 {
        u64::MAX
    } else {
        (1u64 << b) - 1
    }
}

fn packed_size(num_perm: usize, b: u8) -> usize {
    (num_perm * usize::from(b) + 7) / 8
}

/// Packs the low `b` bits of each value into a byte buffer, LSB-first.
fn pack_bits(values: &[u64], b: u8) -> Vec<u8> {
    let mut out = vec![0u8; packed_size(values.len(), b)];
    let mut bit = 0usize;
    for &v in values {
        for k in 0..usize::from(b) {
            if (v >> k) & 1 == 1 {
                out[bit >> 3] |= 1 << (bit & 7);
            }
            bit += 1;
        }
    }
    out
}

fn unpack_bits(packed: &[u8], num_perm: usize, b: u8) -> Vec<u64> {
    let mut values = Vec::with_capacity(num_perm);
    let mut bit = 0usize;
    for _ in 0..num_perm {
        let mut v = 0u64;
        for k in 0..usize::from(b) {
            if (packed[bit >> 3] >> (bit & 7)) & 1 == 1 {
                v |= 1 << k;
            }
            bit += 1;
        }
        values.push(v);
    }
    values
}
