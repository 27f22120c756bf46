//! HyperLogLog and HyperLogLog++ cardinality estimators.
//!
//! Both sketches keep `m = 2^p` one-byte registers. An incoming digest is
//! split into a register index (the low `p` bits) and a rank (one plus the
//! count of leading zeros in the remaining hash bits); each register keeps
//! the maximum rank it has seen. The harmonic mean of `2^{-R[j]}` then
//! yields the raw cardinality estimate.
//!
//! The two variants differ in hash width and small-range handling:
//!
//! - [`HyperLogLog`] consumes 32-bit digests and applies the classic
//!   linear-counting small-range and `2^32` large-range corrections.
//! - [`HyperLogLogPlusPlus`] consumes 64-bit digests (no large-range
//!   correction needed) and subtracts an empirically tabulated bias from
//!   small raw estimates, falling back to linear counting below a
//!   per-precision threshold.
//!
//! ## References
//!
//! - Flajolet, Fusy, Gandouet, Meunier (2007). "HyperLogLog: the analysis of
//!   a near-optimal cardinality estimation algorithm"
//! - Heule, Nunkesser, Hall (2013). "HyperLogLog in Practice"

mod bias;

use crate::error::{Result, SketchError};
use crate::ingest;
use crate::persistence::{ByteReader, Persistable, FORMAT_VERSION, HLLPP_MAGIC, HLL_MAGIC};

/// Default precision for both variants.
pub const DEFAULT_PRECISION: u8 = 8;

const MIN_PRECISION: u8 = 4;
const MAX_PRECISION_HLL: u8 = 16;
const MAX_PRECISION_HLLPP: u8 = 18;

/// Classic 32-bit HyperLogLog.
///
/// # Example
/// ```rust
/// use semblance::HyperLogLog;
/// use sha2::{Digest, Sha256};
///
/// let mut hll = HyperLogLog::new(12)?;
/// for i in 0..10_000u64 {
///     hll.digest(&Sha256::digest(i.to_le_bytes()))?;
/// }
/// let estimate = hll.count();
/// assert!(estimate > 9_000.0 && estimate < 11_000.0);
/// # Ok::<(), semblance::SketchError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperLogLog {
    p: u8,
    registers: Vec<u8>,
}

/// 64-bit HyperLogLog++ with empirical small-range bias correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperLogLogPlusPlus {
    p: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Creates a sketch with `2^p` registers. Valid `p` is `[4, 16]`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] for out-of-range `p`.
    pub fn new(p: u8) -> Result<Self> {
        validate_precision(p, MAX_PRECISION_HLL)?;
        Ok(Self {
            p,
            registers: vec![0; 1 << p],
        })
    }

    /// Creates a sketch from a target relative error, using
    /// `p = ceil(log2((1.04 / relative_error)²))` clamped to `[4, 16]`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] for invalid
    /// `relative_error`.
    pub fn with_error_rate(relative_error: f64) -> Result<Self> {
        Self::new(precision_for_error(relative_error, MAX_PRECISION_HLL)?)
    }

    /// The precision parameter.
    pub fn p(&self) -> u8 {
        self.p
    }

    /// Number of registers (`2^p`).
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Theoretical relative error, `1.04 / sqrt(m)`.
    pub fn expected_relative_error(&self) -> f64 {
        1.04 / (self.register_count() as f64).sqrt()
    }

    /// True while no digest has been folded in.
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    /// Read-only view of the registers.
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Folds one externally hashed item into the sketch.
    ///
    /// The low 4 bytes of `digest` are taken as a little-endian `u32`; the
    /// low `p` bits select a register and the remaining `32 − p` bits supply
    /// the rank.
    ///
    /// # Errors
    /// Returns [`SketchError::DigestTooShort`] for digests under 4 bytes.
    pub fn digest(&mut self, digest: &[u8]) -> Result<()> {
        let x = u64::from(ingest::low_u32(digest)?);
        update_register(&mut self.registers, self.p, x, 32);
        Ok(())
    }

    /// Merges `other` in-place by element-wise register maximum.
    ///
    /// # Errors
    /// Returns [`SketchError::Incompatible`] on mismatched precision.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        merge_registers(&mut self.registers, self.p, &other.registers, other.p)
    }

    /// Estimated cardinality with small- and large-range corrections.
    pub fn count(&self) -> f64 {
        let m = self.registers.len() as f64;
        let e = raw_estimate(&self.registers);
        let zeros = count_zero_registers(&self.registers);

        if e <= 2.5 * m && zeros > 0 {
            return linear_count(self.registers.len(), zeros);
        }

        const TWO_32: f64 = 4_294_967_296.0;
        if e > TWO_32 / 30.0 {
            // saturated registers can push the raw estimate past 2^32
            let ratio = (e / TWO_32).min(1.0 - f64::EPSILON);
            return -TWO_32 * (1.0 - ratio).ln();
        }

        e
    }
}

impl HyperLogLogPlusPlus {
    /// Creates a sketch with `2^p` registers. Valid `p` is `[4, 18]`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] for out-of-range `p`.
    pub fn new(p: u8) -> Result<Self> {
        validate_precision(p, MAX_PRECISION_HLLPP)?;
        Ok(Self {
            p,
            registers: vec![0; 1 << p],
        })
    }

    /// Creates a sketch from a target relative error, clamped to `[4, 18]`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] for invalid
    /// `relative_error`.
    pub fn with_error_rate(relative_error: f64) -> Result<Self> {
        Self::new(precision_for_error(relative_error, MAX_PRECISION_HLLPP)?)
    }

    /// The precision parameter.
    pub fn p(&self) -> u8 {
        self.p
    }

    /// Number of registers (`2^p`).
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Theoretical relative error, `1.04 / sqrt(m)`.
    pub fn expected_relative_error(&self) -> f64 {
        1.04 / (self.register_count() as f64).sqrt()
    }

    /// True while no digest has been folded in.
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    /// Read-only view of the registers.
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Folds one externally hashed item into the sketch.
    ///
    /// The low 8 bytes of `digest` are taken as a little-endian `u64`; the
    /// low `p` bits select a register and the remaining `64 − p` bits supply
    /// the rank.
    ///
    /// # Errors
    /// Returns [`SketchError::DigestTooShort`] for digests under 8 bytes.
    pub fn digest(&mut self, digest: &[u8]) -> Result<()> {
        let x = ingest::low_u64(digest)?;
        update_register(&mut self.registers, self.p, x, 64);
        Ok(())
    }

    /// Merges `other` in-place by element-wise register maximum.
    ///
    /// # Errors
    /// Returns [`SketchError::Incompatible`] on mismatched precision.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        merge_registers(&mut self.registers, self.p, &other.registers, other.p)
    }

    /// Estimated cardinality with bias-corrected small-range handling.
    ///
    /// Raw estimates at or below `5m` have the tabulated bias subtracted;
    /// while any register is still zero, the linear-counting estimate is
    /// preferred when it sits below the per-precision threshold.
    pub fn count(&self) -> f64 {
        let m = self.registers.len() as f64;
        let e = raw_estimate(&self.registers);
        let corrected = if e <= 5.0 * m {
            e - bias::estimate_bias(e, self.p)
        } else {
            e
        };

        let zeros = count_zero_registers(&self.registers);
        let candidate = if zeros > 0 {
            linear_count(self.registers.len(), zeros)
        } else {
            corrected
        };

        let estimate = if candidate <= bias::threshold(self.p) {
            candidate
        } else {
            corrected
        };
        estimate.max(0.0)
    }
}

impl Persistable for HyperLogLog {
    fn to_bytes(&self) -> Vec<u8> {
        registers_to_bytes(&HLL_MAGIC, self.p, &self.registers)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (p, registers) =
            registers_from_bytes(bytes, &HLL_MAGIC, "hyperloglog", MAX_PRECISION_HLL, 32)?;
        Ok(Self { p, registers })
    }

    fn bytesize(&self) -> usize {
        registers_bytesize(&self.registers)
    }
}

impl Persistable for HyperLogLogPlusPlus {
    fn to_bytes(&self) -> Vec<u8> {
        registers_to_bytes(&HLLPP_MAGIC, self.p, &self.registers)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (p, registers) =
            registers_from_bytes(bytes, &HLLPP_MAGIC, "hyperloglog++", MAX_PRECISION_HLLPP, 64)?;
        Ok(Self { p, registers })
    }

    fn bytesize(&self) -> usize {
        registers_bytesize(&self.registers)
    }
}

fn validate_precision(p: u8, max: u8) -> Result<()> {
    if !(MIN_PRECISION..=max).contains(&p) {
        return Err(SketchError::InvalidParameter(format!(
            "precision must be in the inclusive range [{MIN_PRECISION}, {max}], got {p}"
        )));
    }
    Ok(())
}

fn precision_for_error(relative_error: f64, max: u8) -> Result<u8> {
    if !relative_error.is_finite() || relative_error <= 0.0 || relative_error >= 1.0 {
        return Err(SketchError::InvalidParameter(
            "relative_error must be finite and strictly between 0 and 1".into(),
        ));
    }
    let required = (1.04 / relative_error).powi(2);
    let p = required.log2().ceil() as u8;
    Ok(p.clamp(MIN_PRECISION, max))
}

/// Splits `x` into register index (low `p` bits) and rank, and keeps the
/// register maximum. `width` is the hash width in bits (32 or 64).
#[inline]
fn update_register(registers: &mut [u8], p: u8, x: u64, width: u32) {
    let j = (x & (registers.len() as u64 - 1)) as usize;
    let w = x >> p;
    let rank = rho(w, width - u32::from(p));
    if rank > registers[j] {
        registers[j] = rank;
    }
}

/// One plus the number of leading zeros of `w` within a `bits`-wide window;
/// `rho(0) = bits + 1`.
#[inline]
fn rho(w: u64, bits: u32) -> u8 {
    let bit_length = 64 - w.leading_zeros();
    (bits - bit_length + 1) as u8
}

fn merge_registers(mine: &mut [u8], my_p: u8, theirs: &[u8], their_p: u8) -> Result<()> {
    if my_p != their_p {
        return Err(SketchError::Incompatible(format!(
            "merge requires matching precision: {my_p} vs {their_p}"
        )));
    }
    for (a, &b) in mine.iter_mut().zip(theirs.iter()) {
        if b > *a {
            *a = b;
        }
    }
    Ok(())
}

/// `α_m · m² / Σ 2^{-R[j]}`.
fn raw_estimate(registers: &[u8]) -> f64 {
    let m = registers.len() as f64;
    let sum: f64 = registers
        .iter()
        .map(|&r| 2.0f64.powi(-i32::from(r)))
        .sum();
    alpha(registers.len()) * m * m / sum
}

fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / m as f64),
    }
}

fn count_zero_registers(registers: &[u8]) -> usize {
    registers.iter().filter(|&&r| r == 0).count()
}

/// Linear counting: `m · ln(m / V)` where `V` counts zero registers.
fn linear_count(m: usize, zeros: usize) -> f64 {
    let m = m as f64;
    m * (m / zeros as f64).ln()
}

fn registers_to_bytes(magic: &[u8; 4], p: u8, registers: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(registers_bytesize(registers));
    buf.extend_from_slice(magic);
    buf.push(FORMAT_VERSION);
    buf.push(p);
    buf.extend_from_slice(registers);
    buf
}

fn registers_from_bytes(
    bytes: &[u8],
    magic: &[u8; 4],
    what: &str,
    max_p: u8,
    width: u8,
) -> Result<(u8, Vec<u8>)> {
    let mut r = ByteReader::new(bytes);
    r.header(magic, what)?;
    let p = r.u8()?;
    validate_precision(p, max_p).map_err(|e| SketchError::Serialization(e.to_string()))?;
    let registers = r.take(1 << p)?.to_vec();
    r.finish()?;
    let max_rank = width - p + 1;
    if let Some(&bad) = registers.iter().find(|&&v| v > max_rank) {
        return Err(SketchError::Serialization(format!(
            "register value {bad} exceeds the maximum rank {max_rank}"
        )));
    }
    Ok((p, registers))
}

fn registers_bytesize(registers: &[u8]) -> usize {
    // magic + version + p + registers
    4 + 1 + 1 + registers.len()
}
