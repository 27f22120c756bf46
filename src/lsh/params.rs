//! LSH configuration and the optimal band/row solver.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SketchError};
use crate::minhash::DEFAULT_NUM_PERM;

/// Subintervals used by the trapezoidal integration below. Fixed so that the
/// solved `(b, r)` is reproducible across platforms.
const INTEGRATION_STEPS: usize = 1000;

/// Relative importance of false positives vs false negatives when solving
/// for `(b, r)`. The two weights must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Weight on the false-positive area below the threshold.
    pub false_positive: f64,
    /// Weight on the false-negative area above the threshold.
    pub false_negative: f64,
}

impl Weights {
    /// Validated constructor: each weight in `(0, 1)`, summing to 1.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] otherwise.
    pub fn new(false_positive: f64, false_negative: f64) -> Result<Self> {
        let w = Self {
            false_positive,
            false_negative,
        };
        w.validate()?;
        Ok(w)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("false_positive", self.false_positive),
            ("false_negative", self.false_negative),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(SketchError::InvalidParameter(format!(
                    "{name} weight must be strictly between 0 and 1, got {value}"
                )));
            }
        }
        if ((self.false_positive + self.false_negative) - 1.0).abs() > 1e-9 {
            return Err(SketchError::InvalidParameter(format!(
                "weights must sum to 1, got {}",
                self.false_positive + self.false_negative
            )));
        }
        Ok(())
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            false_positive: 0.5,
            false_negative: 0.5,
        }
    }
}

/// Construction parameters for [`crate::MinHashLsh`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LshParams {
    /// Target Jaccard threshold, in `(0, 1)`.
    pub threshold: f64,
    /// Register count of the indexed MinHashes.
    pub num_perm: usize,
    /// False-positive / false-negative weighting for the solver.
    pub weights: Weights,
}

impl LshParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 || self.threshold >= 1.0 {
            return Err(SketchError::InvalidParameter(format!(
                "threshold must be strictly between 0 and 1, got {}",
                self.threshold
            )));
        }
        if self.num_perm == 0 {
            return Err(SketchError::InvalidParameter(
                "num_perm must be at least 1".into(),
            ));
        }
        self.weights.validate()
    }
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            num_perm: DEFAULT_NUM_PERM,
            weights: Weights::default(),
        }
    }
}

/// Probability that at least one of `b` bands of `r` rows collides at true
/// Jaccard `s`.
pub(crate) fn collision_probability(s: f64, b: usize, r: usize) -> f64 {
    1.0 - (1.0 - s.powi(r as i32)).powi(b as i32)
}

/// Area of the collision curve below the threshold (reported pairs that
/// should not have been).
fn false_positive_area(threshold: f64, b: usize, r: usize) -> f64 {
    integrate(|s| collision_probability(s, b, r), 0.0, threshold)
}

/// Area of the miss curve above the threshold (pairs that should have been
/// reported but were not).
fn false_negative_area(threshold: f64, b: usize, r: usize) -> f64 {
    integrate(|s| 1.0 - collision_probability(s, b, r), threshold, 1.0)
}

fn integrate<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> f64 {
    let h = (b - a) / INTEGRATION_STEPS as f64;
    let mut sum = (f(a) + f(b)) / 2.0;
    for i in 1..INTEGRATION_STEPS {
        sum += f(a + h * i as f64);
    }
    sum * h
}

/// Exhaustively solves for the `(b, r)` with `b · r ≤ num_perm` minimizing
/// the weighted false-positive/false-negative objective.
///
/// Ties prefer larger `b` (finer recall granularity). The search is a pure
/// function of its inputs, so the result is identical across runs and
/// platforms.
pub(crate) fn optimal_params(threshold: f64, num_perm: usize, weights: Weights) -> (usize, usize) {
    let mut best = (1, 1);
    let mut best_error = f64::INFINITY;
    for b in 1..=num_perm {
        for r in 1..=num_perm / b {
            let fp = false_positive_area(threshold, b, r);
            let fn_ = false_negative_area(threshold, b, r);
            let error = weights.false_positive * fp + weights.false_negative * fn_;
            if error <= best_error {
                best_error = error;
                best = (b, r);
            }
        }
    }
    best
}
