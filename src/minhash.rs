//! MinHash sketch for Jaccard resemblance and cardinality estimation.
//!
//! A MinHash keeps, per permutation, the minimum permuted hash value seen so
//! far. The probability that two sketches agree on a register equals the
//! Jaccard similarity of the underlying sets:
//! `P[min h_i(A) = min h_i(B)] = J(A, B)`, so the fraction of matching
//! registers is an unbiased estimator of `J`.
//!
//! Sketches feed on externally produced hash digests (see [`crate::ingest`]);
//! the low 4 bytes of each digest are interpreted as a little-endian `u32`.
//!
//! ## References
//!
//! - Broder (1997). "On the resemblance and containment of documents"
//! - Broder et al. (2000). "Min-wise independent permutations"

use std::sync::Arc;

use crate::error::{Result, SketchError};
use crate::ingest;
use crate::permutation::{Permutations, MERSENNE_PRIME};
use crate::persistence::{ByteReader, Persistable, FORMAT_VERSION, MINHASH_MAGIC};

/// Default register count.
pub const DEFAULT_NUM_PERM: usize = 128;

/// Default permutation-family seed.
pub const DEFAULT_SEED: u32 = 1;

/// Empty-register sentinel: the largest value a register can hold.
pub const MAX_HASH: u64 = MERSENNE_PRIME - 1;

/// MinHash signature sketch.
///
/// Two sketches can be merged or compared only when they were built from the
/// same `(seed, num_perm)` — that is what guarantees their permutation
/// families are identical.
///
/// # Example
/// ```rust
/// use semblance::MinHash;
/// use sha2::{Digest, Sha256};
///
/// let mut left = MinHash::new(128, 1)?;
/// let mut right = MinHash::new(128, 1)?;
/// for token in ["apple", "banana", "cherry"] {
///     left.digest(&Sha256::digest(token))?;
///     right.digest(&Sha256::digest(token))?;
/// }
/// assert_eq!(left.jaccard(&right)?, 1.0);
/// # Ok::<(), semblance::SketchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MinHash {
    permutations: Arc<Permutations>,
    hashvalues: Vec<u64>,
}

impl MinHash {
    /// Creates an empty sketch with `num_perm` registers.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `num_perm == 0`.
    pub fn new(num_perm: usize, seed: u32) -> Result<Self> {
        Ok(Self::with_permutations(Permutations::shared(
            seed, num_perm,
        )?))
    }

    /// Creates an empty sketch sharing an existing permutation family.
    ///
    /// Sketches built from the same family are compatible without each one
    /// re-deriving the coefficient tables.
    pub fn with_permutations(permutations: Arc<Permutations>) -> Self {
        let num_perm = permutations.len();
        Self {
            permutations,
            hashvalues: vec![MAX_HASH; num_perm],
        }
    }

    /// Creates a sketch sized for a target standard error, using
    /// `num_perm = ceil(1 / std_error²)`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] for a non-finite or
    /// out-of-range `std_error`.
    pub fn with_error_rate(std_error: f64, seed: u32) -> Result<Self> {
        if !std_error.is_finite() || std_error <= 0.0 || std_error >= 1.0 {
            return Err(SketchError::InvalidParameter(
                "std_error must be finite and strictly between 0 and 1".into(),
            ));
        }
        let num_perm = (1.0 / (std_error * std_error)).ceil() as usize;
        Self::new(num_perm.max(1), seed)
    }

    /// Number of registers.
    pub fn num_perm(&self) -> usize {
        self.hashvalues.len()
    }

    /// The permutation-family seed.
    pub fn seed(&self) -> u32 {
        self.permutations.seed()
    }

    /// The expected standard error of the Jaccard estimate,
    /// `1 / sqrt(num_perm)`.
    pub fn expected_error(&self) -> f64 {
        1.0 / (self.num_perm() as f64).sqrt()
    }

    /// True while every register still holds the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.hashvalues.iter().all(|&h| h == MAX_HASH)
    }

    /// Read-only view of the register minima.
    pub fn hashvalues(&self) -> &[u64] {
        &self.hashvalues
    }

    /// The shared permutation family.
    pub fn permutations(&self) -> &Arc<Permutations> {
        &self.permutations
    }

    /// Folds one externally hashed item into the sketch.
    ///
    /// The low 4 bytes of `digest` are taken as a little-endian `u32` and
    /// pushed through every permutation; each register keeps its minimum.
    ///
    /// # Errors
    /// Returns [`SketchError::DigestTooShort`] for digests under 4 bytes.
    pub fn digest(&mut self, digest: &[u8]) -> Result<()> {
        let x = ingest::low_u32(digest)?;
        for (i, h) in self.hashvalues.iter_mut().enumerate() {
            let p = self.permutations.apply(i, x);
            if p < *h {
                *h = p;
            }
        }
        Ok(())
    }

    /// Merges `other` in-place by element-wise minimum.
    ///
    /// The result sketches the union of the two inputs. Merge is
    /// commutative, associative, and idempotent.
    ///
    /// # Errors
    /// Returns [`SketchError::Incompatible`] on mismatched `(seed, num_perm)`.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other, "merge")?;
        for (h, &o) in self.hashvalues.iter_mut().zip(other.hashvalues.iter()) {
            if o < *h {
                *h = o;
            }
        }
        Ok(())
    }

    /// Estimates Jaccard similarity as the fraction of matching registers.
    ///
    /// # Errors
    /// Returns [`SketchError::Incompatible`] on mismatched `(seed, num_perm)`.
    pub fn jaccard(&self, other: &Self) -> Result<f64> {
        self.check_compatible(other, "jaccard")?;
        let matches = self
            .hashvalues
            .iter()
            .zip(other.hashvalues.iter())
            .filter(|(a, b)| a == b)
            .count();
        Ok(matches as f64 / self.num_perm() as f64)
    }

    /// Estimates the cardinality of the sketched set:
    /// `num_perm / (Σ (H[i] + 1) / M) − 1`.
    ///
    /// An empty sketch estimates exactly 0.
    pub fn count(&self) -> f64 {
        let m = MERSENNE_PRIME as f64;
        let sum: f64 = self
            .hashvalues
            .iter()
            .map(|&h| (h + 1) as f64 / m)
            .sum();
        self.num_perm() as f64 / sum - 1.0
    }

    fn check_compatible(&self, other: &Self, op: &str) -> Result<()> {
        if self.num_perm() != other.num_perm() {
            return Err(SketchError::Incompatible(format!(
                "{op} requires matching num_perm: {} vs {}",
                self.num_perm(),
                other.num_perm()
            )));
        }
        if self.seed() != other.seed() {
            return Err(SketchError::Incompatible(format!(
                "{op} requires matching seed: {} vs {}",
                self.seed(),
                other.seed()
            )));
        }
        Ok(())
    }
}

impl PartialEq for MinHash {
    fn eq(&self, other: &Self) -> bool {
        self.seed() == other.seed() && self.hashvalues == other.hashvalues
    }
}

impl Eq for MinHash {}

impl Persistable for MinHash {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.bytesize());
        buf.extend_from_slice(&MINHASH_MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&self.seed().to_le_bytes());
        buf.extend_from_slice(&(self.num_perm() as u32).to_le_bytes());
        for &h in &self.hashvalues {
            buf.extend_from_slice(&h.to_le_bytes());
        }
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        r.header(&MINHASH_MAGIC, "minhash")?;
        let seed = r.u32_le()?;
        let num_perm = r.u32_le()? as usize;
        // registers must account for the rest of the buffer exactly, checked
        // before deriving the (potentially large) permutation tables
        let registers = r.take(num_perm.checked_mul(8).ok_or_else(|| {
            SketchError::Serialization("register payload length overflows".into())
        })?)?;
        r.finish()?;
        let permutations = Permutations::shared(seed, num_perm)
            .map_err(|e| SketchError::Serialization(e.to_string()))?;
        let mut hashvalues = Vec::with_capacity(num_perm);
        for chunk in registers.chunks_exact(8) {
            let h = u64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]);
            if h >= MERSENNE_PRIME {
                return Err(SketchError::Serialization(format!(
                    "register value {h} outside the permutation range"
                )));
            }
            hashvalues.push(h);
        }
        Ok(Self {
            permutations,
            hashvalues,
        })
    }

    fn bytesize(&self) -> usize {
        // magic + version + seed + num_perm + registers
        4 + 1 + 4 + 4 + 8 * self.num_perm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(token: &str) -> [u8; 8] {
        // cheap deterministic stand-in for an external hash
        let mut x = 0xcbf2_9ce4_8422_2325u64;
        for byte in token.bytes() {
            x ^= u64::from(byte);
            x = x.wrapping_mul(0x0000_0100_0000_01B3);
        }
        x.to_le_bytes()
    }

    #[test]
    fn constructor_validates_num_perm() {
        assert!(MinHash::new(0, 1).is_err());
        assert!(MinHash::new(128, 1).is_ok());
    }

    #[test]
    fn identical_streams_give_jaccard_one() {
        let mut a = MinHash::new(128, 1).unwrap();
        let mut b = MinHash::new(128, 1).unwrap();
        for i in 0..100u64 {
            a.digest(&i.to_le_bytes()).unwrap();
            b.digest(&i.to_le_bytes()).unwrap();
        }
        assert_eq!(a.jaccard(&b).unwrap(), 1.0);
    }

    #[test]
    fn jaccard_estimate_tracks_overlap() {
        let mut a = MinHash::new(256, 1).unwrap();
        let mut b = MinHash::new(256, 1).unwrap();
        for i in 0..1000u64 {
            a.digest(&digest_of(&format!("item-{i}"))).unwrap();
        }
        for i in 500..1500u64 {
            b.digest(&digest_of(&format!("item-{i}"))).unwrap();
        }
        let estimate = a.jaccard(&b).unwrap();
        let exact = 500.0 / 1500.0;
        assert!(
            (estimate - exact).abs() < 0.12,
            "estimate={estimate} exact={exact}"
        );
    }

    #[test]
    fn merge_is_elementwise_min() {
        let mut a = MinHash::new(64, 1).unwrap();
        let mut b = MinHash::new(64, 1).unwrap();
        for i in 0..200u64 {
            a.digest(&digest_of(&format!("a-{i}"))).unwrap();
            b.digest(&digest_of(&format!("b-{i}"))).unwrap();
        }
        let mut merged = a.clone();
        merged.merge(&b).unwrap();
        for i in 0..64 {
            assert_eq!(
                merged.hashvalues()[i],
                a.hashvalues()[i].min(b.hashvalues()[i])
            );
        }
    }

    #[test]
    fn merge_matches_digesting_the_union() {
        let mut a = MinHash::new(64, 1).unwrap();
        let mut b = MinHash::new(64, 1).unwrap();
        let mut union = MinHash::new(64, 1).unwrap();
        for i in 0..100u64 {
            let d = digest_of(&format!("x-{i}"));
            a.digest(&d).unwrap();
            union.digest(&d).unwrap();
        }
        for i in 50..150u64 {
            let d = digest_of(&format!("x-{i}"));
            b.digest(&d).unwrap();
            union.digest(&d).unwrap();
        }
        let mut merged = a;
        merged.merge(&b).unwrap();
        assert_eq!(merged, union);
    }

    #[test]
    fn incompatible_sketches_are_rejected() {
        let mut a = MinHash::new(64, 1).unwrap();
        let b = MinHash::new(128, 1).unwrap();
        let c = MinHash::new(64, 2).unwrap();
        assert!(a.merge(&b).is_err());
        assert!(a.jaccard(&b).is_err());
        assert!(a.merge(&c).is_err());
        assert!(a.jaccard(&c).is_err());
    }

    #[test]
    fn short_digest_is_rejected_without_mutation() {
        let mut m = MinHash::new(32, 1).unwrap();
        assert_eq!(
            m.digest(&[1, 2, 3]),
            Err(SketchError::DigestTooShort { needed: 4, got: 3 })
        );
        assert!(m.is_empty());
    }

    #[test]
    fn empty_sketch_counts_zero() {
        let m = MinHash::new(128, 1).unwrap();
        assert_eq!(m.count(), 0.0);
    }

    #[test]
    fn count_is_reasonable() {
        let mut m = MinHash::new(256, 1).unwrap();
        let exact = 5000u64;
        for i in 0..exact {
            m.digest(&digest_of(&format!("elem-{i}"))).unwrap();
        }
        let estimate = m.count();
        let rel = (estimate - exact as f64).abs() / exact as f64;
        assert!(rel < 0.2, "estimate={estimate} exact={exact} rel={rel}");
    }

    #[test]
    fn registers_stay_below_modulus() {
        let mut m = MinHash::new(64, 3).unwrap();
        for i in 0..1000u64 {
            m.digest(&i.to_le_bytes()).unwrap();
        }
        assert!(m.hashvalues().iter().all(|&h| h < MERSENNE_PRIME));
    }

    #[test]
    fn roundtrip_preserves_equality() {
        let mut m = MinHash::new(128, 9).unwrap();
        for i in 0..500u64 {
            m.digest(&digest_of(&format!("t-{i}"))).unwrap();
        }
        let bytes = m.to_bytes();
        assert_eq!(bytes.len(), m.bytesize());
        let loaded = MinHash::from_bytes(&bytes).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(loaded.jaccard(&m).unwrap(), 1.0);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let m = MinHash::new(16, 1).unwrap();
        let bytes = m.to_bytes();
        assert!(MinHash::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(MinHash::from_bytes(&bytes[..4]).is_err());
    }

    #[test]
    fn with_error_rate_sizes_registers() {
        let m = MinHash::with_error_rate(0.1, 1).unwrap();
        assert_eq!(m.num_perm(), 100);
        assert!(MinHash::with_error_rate(0.0, 1).is_err());
        assert!(MinHash::with_error_rate(1.0, 1).is_err());
        assert!(MinHash::with_error_rate(f64::NAN, 1).is_err());
    }
}
