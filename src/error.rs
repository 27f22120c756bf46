//! Error types for semblance.

use thiserror::Error;

/// Errors that can occur while constructing, mutating, or comparing sketches.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    /// Invalid construction parameter (register count, precision, bit width,
    /// threshold, or weights out of range).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Cross-sketch operation on sketches with mismatched parameters.
    #[error("incompatible sketches: {0}")]
    Incompatible(String),

    /// The supplied hash digest is shorter than the sketch requires.
    #[error("digest too short: need {needed} bytes, got {got}")]
    DigestTooShort { needed: usize, got: usize },

    /// LSH insertion with a key that is already present.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Bad magic, version mismatch, or truncated/corrupt buffer on load.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for semblance operations.
pub type Result<T> = std::result::Result<T, SketchError>;
