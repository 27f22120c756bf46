//! semblance: probabilistic sketches for set summarization.
//!
//! Estimate set cardinality and pairwise resemblance (Jaccard similarity)
//! over arbitrarily large streams in bounded memory, and answer
//! nearest-neighbor resemblance queries in sub-linear time:
//!
//! - **[`MinHash`]** — fixed-width signature sketch: incremental insertion,
//!   union via merge, Jaccard and cardinality estimation.
//! - **[`BBitMinHash`]** — compressed compare-only projection of a MinHash.
//! - **[`HyperLogLog`] / [`HyperLogLogPlusPlus`]** — register-array
//!   cardinality estimators (32-bit and bias-corrected 64-bit variants).
//! - **[`MinHashLsh`]** — banded locality-sensitive index over MinHash
//!   signatures with a solved band/row layout.
//!
//! # Which Sketch Should I Use?
//!
//! | Question | Sketch | Memory |
//! |----------|--------|--------|
//! | "How similar are these two sets?" | [`MinHash`] | `8 · num_perm` B |
//! | "…with minimal storage per set?" | [`BBitMinHash`] | `b · num_perm` bits |
//! | "How many distinct items?" | [`HyperLogLog`]`(++)` | `2^p` B |
//! | "Which stored sets resemble this one?" | [`MinHashLsh`] | `O(b · keys)` |
//!
//! # Hashing Is the Caller's Job
//!
//! Sketches never hash items themselves: every `digest` call takes the raw
//! output of whatever hash function you chose (SHA, BLAKE3, xxHash, …) and
//! reads only the low-order bytes it needs — 4 for [`MinHash`] and
//! [`HyperLogLog`], 8 for [`HyperLogLogPlusPlus`]. Shorter digests fail with
//! [`SketchError::DigestTooShort`].
//!
//! ```rust
//! use semblance::{MinHash, Persistable};
//! use sha2::{Digest, Sha256};
//!
//! let mut news = MinHash::new(128, 1)?;
//! let mut wire = MinHash::new(128, 1)?;
//! for word in "the quick brown fox".split(' ') {
//!     news.digest(&Sha256::digest(word))?;
//! }
//! for word in "the quick brown dog".split(' ') {
//!     wire.digest(&Sha256::digest(word))?;
//! }
//! let resemblance = news.jaccard(&wire)?;
//! assert!(resemblance > 0.0 && resemblance < 1.0);
//!
//! // sketches round-trip through a compact versioned byte layout
//! let restored = MinHash::from_bytes(&news.to_bytes())?;
//! assert_eq!(restored, news);
//! # Ok::<(), semblance::SketchError>(())
//! ```
//!
//! # Mergeability
//!
//! Sketches built independently from the same parameters can be merged
//! without coordination: MinHash permutation coefficients are a pure
//! function of `(seed, num_perm)`, so registers line up across processes,
//! and HyperLogLog merge is a plain element-wise register maximum. Merge
//! never loses information — merging equals having digested the union.
//!
//! # Concurrency
//!
//! Sketches and the LSH index are plain in-memory values with no interior
//! mutability: share them freely among readers, and give writers (`digest`,
//! `merge`, `insert`) exclusive access. Nothing blocks, suspends, or touches
//! I/O.

pub mod bbit;
pub mod error;
pub mod hyperloglog;
pub mod ingest;
pub mod lsh;
pub mod minhash;
pub mod permutation;
pub mod persistence;

pub use bbit::BBitMinHash;
pub use error::{Result, SketchError};
pub use hyperloglog::{HyperLogLog, HyperLogLogPlusPlus};
pub use lsh::{LshParams, MinHashLsh, Weights};
pub use minhash::MinHash;
pub use permutation::Permutations;
pub use persistence::Persistable;
