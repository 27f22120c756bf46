//! Universal-hash permutation family shared by MinHash sketches.
//!
//! Each permutation is `h_i(x) = (a_i · x + b_i) mod M` with
//! `M = 2^61 − 1` (a Mersenne prime). The coefficient arrays are a pure
//! function of `(seed, num_perm)`: two sketches built independently from the
//! same parameters draw byte-identical coefficients, which is what makes
//! their registers mergeable and comparable without coordination.
//!
//! Coefficients are drawn from a ChaCha8 stream seeded directly with `seed`.
//! A stream-cipher generator is used (rather than the standard library-ish
//! `StdRng`) because the draw sequence is a cross-process contract and must
//! not change underneath a `rand` upgrade.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, SketchError};

/// The modulus of the permutation family: the Mersenne prime `2^61 − 1`.
pub const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// A deterministic family of `num_perm` universal hash permutations.
///
/// Immutable after construction; share one family across many sketches with
/// [`Permutations::shared`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutations {
    seed: u32,
    a: Vec<u64>,
    b: Vec<u64>,
}

impl Permutations {
    /// Draws a family of `num_perm` permutations from `seed`.
    ///
    /// `a_i` is uniform in `[1, M)`, `b_i` uniform in `[0, M)`, drawn in
    /// ascending register order, `a_i` before `b_i`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `num_perm == 0`.
    pub fn new(seed: u32, num_perm: usize) -> Result<Self> {
        if num_perm == 0 {
            return Err(SketchError::InvalidParameter(
                "num_perm must be at least 1".into(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(u64::from(seed));
        let mut a = Vec::with_capacity(num_perm);
        let mut b = Vec::with_capacity(num_perm);
        for _ in 0..num_perm {
            a.push(rng.gen_range(1..MERSENNE_PRIME));
            b.push(rng.gen_range(0..MERSENNE_PRIME));
        }

        Ok(Self { seed, a, b })
    }

    /// Like [`Permutations::new`], wrapped in an `Arc` for sharing across
    /// sketches with matching parameters.
    pub fn shared(seed: u32, num_perm: usize) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(seed, num_perm)?))
    }

    /// The seed this family was drawn from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of permutations in the family.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    /// Always false: construction rejects empty families.
    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Applies permutation `i` to `x`.
    ///
    /// The product needs 128-bit intermediate arithmetic: `a_i` is close to
    /// `2^61` and `x` up to `2^32`.
    #[inline]
    pub fn apply(&self, i: usize, x: u32) -> u64 {
        let p = (u128::from(self.a[i]) * u128::from(x) + u128::from(self.b[i]))
            % u128::from(MERSENNE_PRIME);
        p as u64
    }
}
