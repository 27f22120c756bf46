//! MinHash LSH: banded locality-sensitive hashing over MinHash registers.
//!
//! The `num_perm` registers of a MinHash are partitioned into `b` bands of
//! `r` rows. Two sketches land in the same bucket of band `t` when their `r`
//! registers in that band agree exactly, which happens with probability
//! `s^r` for true Jaccard `s`; a pair is a candidate when any of the `b`
//! bands collides, probability `1 − (1 − s^r)^b`. Choosing `(b, r)` shapes
//! that curve into a steep transition around a target threshold.
//!
//! # References
//!
//! - Leskovec, Rajaraman, Ullman. "Mining of Massive Datasets", ch. 3
//! - Indyk & Motwani (1998): "Approximate nearest neighbors: towards
//!   removing the curse of dimensionality"

mod index;
mod params;

pub use index::MinHashLsh;
pub use params::{LshParams, Weights};
