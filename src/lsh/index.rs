//! The banded MinHash LSH index.

use std::collections::{BTreeSet, HashMap, HashSet};

use sha2::{Digest, Sha256};
use smallvec::SmallVec;

use crate::error::{Result, SketchError};
use crate::lsh::params::{optimal_params, LshParams, Weights};
use crate::minhash::MinHash;
use crate::persistence::{ByteReader, Persistable, FORMAT_VERSION, LSH_MAGIC};

/// SHA-256 digest of one band's registers; the bucket key within a band
/// table.
type BandKey = Vec<u8>;

/// Per-key list of band signatures, one per band.
type KeySignatures = SmallVec<[BandKey; 16]>;

/// Sub-linear index answering "which keys resemble this sketch above the
/// threshold?".
///
/// Insert-only: a key can never be overwritten or removed. Query results are
/// candidates — the collision curve guarantees high recall around the
/// threshold but admits false positives below it by design.
///
/// # Example
/// ```rust
/// use semblance::{MinHash, MinHashLsh, Weights};
/// use sha2::{Digest, Sha256};
///
/// let mut doc_a = MinHash::new(128, 1)?;
/// let mut doc_b = MinHash::new(128, 1)?;
/// for token in ["flock", "of", "seagulls"] {
///     doc_a.digest(&Sha256::digest(token))?;
///     doc_b.digest(&Sha256::digest(token))?;
/// }
///
/// let mut lsh = MinHashLsh::new(0.5, 128, Weights::default())?;
/// lsh.insert("a", &doc_a)?;
/// assert!(lsh.query(&doc_b)?.contains(&"a".to_string()));
/// # Ok::<(), semblance::SketchError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MinHashLsh {
    threshold: f64,
    num_perm: usize,
    weights: Weights,
    bands: usize,
    rows: usize,
    /// Pinned by the first insert; all later inserts must match.
    seed: Option<u32>,
    tables: Vec<HashMap<BandKey, BTreeSet<String>>>,
    keys: HashMap<String, KeySignatures>,
}

impl MinHashLsh {
    /// Creates an empty index, solving for the optimal `(b, r)` given the
    /// threshold, register budget, and error weighting.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `threshold` is outside
    /// `(0, 1)`, `num_perm` is zero, or the weights are invalid.
    pub fn new(threshold: f64, num_perm: usize, weights: Weights) -> Result<Self> {
        Self::with_params(&LshParams {
            threshold,
            num_perm,
            weights,
        })
    }

    /// Like [`MinHashLsh::new`], from a parameter bundle.
    pub fn with_params(params: &LshParams) -> Result<Self> {
        params.validate()?;
        let (bands, rows) = optimal_params(params.threshold, params.num_perm, params.weights);
        Ok(Self {
            threshold: params.threshold,
            num_perm: params.num_perm,
            weights: params.weights,
            bands,
            rows,
            seed: None,
            tables: vec![HashMap::new(); bands],
            keys: HashMap::new(),
        })
    }

    /// The configured resemblance threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Register count expected of inserted and queried sketches.
    pub fn num_perm(&self) -> usize {
        self.num_perm
    }

    /// The solved band count `b`.
    pub fn bands(&self) -> usize {
        self.bands
    }

    /// The solved rows per band `r`.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `key` has been inserted.
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Indexes `minhash` under `key`.
    ///
    /// All validation happens before any table is touched, so a failed
    /// insert leaves the index unchanged.
    ///
    /// # Errors
    /// - [`SketchError::Incompatible`] when the sketch's `num_perm` differs
    ///   from the index's, or its seed differs from the pinned one.
    /// - [`SketchError::DuplicateKey`] when `key` is already present.
    pub fn insert(&mut self, key: impl Into<String>, minhash: &MinHash) -> Result<()> {
        let key = key.into();
        self.check_num_perm(minhash)?;
        if let Some(seed) = self.seed {
            if minhash.seed() != seed {
                return Err(SketchError::Incompatible(format!(
                    "insert requires the seed pinned by the first insert: {} vs {}",
                    seed,
                    minhash.seed()
                )));
            }
        }
        if self.keys.contains_key(&key) {
            return Err(SketchError::DuplicateKey(key));
        }

        let signatures = self.band_signatures(minhash);
        self.seed = Some(minhash.seed());
        for (table, signature) in self.tables.iter_mut().zip(signatures.iter()) {
            table
                .entry(signature.clone())
                .or_default()
                .insert(key.clone());
        }
        self.keys.insert(key, signatures);
        Ok(())
    }

    /// Returns every key sharing at least one band bucket with `minhash`,
    /// deduplicated, in unspecified order.
    ///
    /// # Errors
    /// Returns [`SketchError::Incompatible`] when the sketch's `num_perm`
    /// differs from the index's.
    pub fn query(&self, minhash: &MinHash) -> Result<Vec<String>> {
        self.check_num_perm(minhash)?;
        let mut candidates: HashSet<&String> = HashSet::new();
        for (table, signature) in self.tables.iter().zip(self.band_signatures(minhash).iter()) {
            if let Some(keys) = table.get(signature) {
                candidates.extend(keys.iter());
            }
        }
        Ok(candidates.into_iter().cloned().collect())
    }

    fn check_num_perm(&self, minhash: &MinHash) -> Result<()> {
        if minhash.num_perm() != self.num_perm {
            return Err(SketchError::Incompatible(format!(
                "index expects num_perm {}, sketch has {}",
                self.num_perm,
                minhash.num_perm()
            )));
        }
        Ok(())
    }

    /// One SHA-256 digest per band over the band's registers, little-endian.
    fn band_signatures(&self, minhash: &MinHash) -> KeySignatures {
        let registers = minhash.hashvalues();
        (0..self.bands)
            .map(|t| {
                let mut hasher = Sha256::new();
                for &h in &registers[t * self.rows..(t + 1) * self.rows] {
                    hasher.update(h.to_le_bytes());
                }
                hasher.finalize().to_vec()
            })
            .collect()
    }
}

impl Persistable for MinHashLsh {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.bytesize());
        buf.extend_from_slice(&LSH_MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&self.threshold.to_le_bytes());
        buf.extend_from_slice(&(self.num_perm as u32).to_le_bytes());
        buf.extend_from_slice(&self.weights.false_positive.to_le_bytes());
        buf.extend_from_slice(&self.weights.false_negative.to_le_bytes());
        buf.extend_from_slice(&(self.bands as u32).to_le_bytes());
        buf.extend_from_slice(&(self.rows as u32).to_le_bytes());
        buf.push(self.seed.is_some() as u8);
        buf.extend_from_slice(&self.seed.unwrap_or(0).to_le_bytes());

        for table in &self.tables {
            buf.extend_from_slice(&(table.len() as u32).to_le_bytes());
            let mut entries: Vec<_> = table.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (signature, keys) in entries {
                buf.extend_from_slice(&(signature.len() as u32).to_le_bytes());
                buf.extend_from_slice(signature);
                buf.extend_from_slice(&(keys.len() as u32).to_le_bytes());
                for key in keys {
                    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
                    buf.extend_from_slice(key.as_bytes());
                }
            }
        }
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        r.header(&LSH_MAGIC, "minhash lsh")?;
        let threshold = r.f64_le()?;
        let num_perm = r.u32_le()? as usize;
        let weights = Weights {
            false_positive: r.f64_le()?,
            false_negative: r.f64_le()?,
        };
        let params = LshParams {
            threshold,
            num_perm,
            weights,
        };
        params
            .validate()
            .map_err(|e| SketchError::Serialization(e.to_string()))?;
        let bands = r.u32_le()? as usize;
        let rows = r.u32_le()? as usize;
        if bands == 0 || rows == 0 || bands * rows > num_perm {
            return Err(SketchError::Serialization(format!(
                "band layout {bands}x{rows} exceeds num_perm {num_perm}"
            )));
        }
        let seed_present = r.u8()?;
        let seed_value = r.u32_le()?;
        let seed = match seed_present {
            0 => None,
            1 => Some(seed_value),
            other => {
                return Err(SketchError::Serialization(format!(
                    "invalid seed-present flag {other}"
                )))
            }
        };

        let mut tables = Vec::with_capacity(bands);
        let mut keys: HashMap<String, KeySignatures> = HashMap::new();
        for _ in 0..bands {
            let entry_count = r.u32_le()? as usize;
            // capacity hint only; the declared count is still walked entry
            // by entry against the remaining buffer
            let mut table = HashMap::with_capacity(entry_count.min(1 << 16));
            for _ in 0..entry_count {
                let sig_len = r.u32_le()? as usize;
                let signature = r.take(sig_len)?.to_vec();
                let key_count = r.u32_le()? as usize;
                let mut bucket = BTreeSet::new();
                for _ in 0..key_count {
                    let key_len = r.u32_le()? as usize;
                    let key = String::from_utf8(r.take(key_len)?.to_vec()).map_err(|_| {
                        SketchError::Serialization("key is not valid UTF-8".into())
                    })?;
                    keys.entry(key.clone()).or_default().push(signature.clone());
                    bucket.insert(key);
                }
                if table.insert(signature, bucket).is_some() {
                    return Err(SketchError::Serialization(
                        "duplicate band signature within a table".into(),
                    ));
                }
            }
            tables.push(table);
        }
        r.finish()?;

        // every key must occupy exactly one bucket per band
        if let Some((key, sigs)) = keys.iter().find(|(_, sigs)| sigs.len() != bands) {
            return Err(SketchError::Serialization(format!(
                "key {key:?} occupies {} bands, expected {bands}",
                sigs.len()
            )));
        }

        Ok(Self {
            threshold,
            num_perm,
            weights,
            bands,
            rows,
            seed,
            tables,
            keys,
        })
    }

    fn bytesize(&self) -> usize {
        // magic + version + threshold + num_perm + weights + (b, r) + seed
        let mut size = 4 + 1 + 8 + 4 + 16 + 8 + 5;
        for table in &self.tables {
            size += 4;
            for (signature, keys) in table {
                size += 4 + signature.len() + 4;
                for key in keys {
                    size += 4 + key.len();
                }
            }
        }
        size
    }
}
