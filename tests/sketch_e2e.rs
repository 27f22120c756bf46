//! End-to-end scenarios exercising the full sketch surface the way a
//! deduplication pipeline would: externally hashed tokens in, resemblance
//! and cardinality estimates out, with serialization in between.

use semblance::{BBitMinHash, HyperLogLog, MinHash, MinHashLsh, Persistable, Weights};
use sha2::{Digest, Sha256};

fn minhash_of(tokens: &[&str]) -> MinHash {
    let mut m = MinHash::new(128, 1).expect("valid parameters");
    for token in tokens {
        m.digest(&Sha256::digest(token.as_bytes())).expect("digest");
    }
    m
}

const DOC1: [&str; 12] = [
    "minhash",
    "is",
    "a",
    "probabilistic",
    "data",
    "structure",
    "for",
    "estimating",
    "the",
    "similarity",
    "between",
    "datasets",
];

// DOC1 with the last token swapped: Jaccard 11/13
const DOC2: [&str; 12] = [
    "minhash",
    "is",
    "a",
    "probabilistic",
    "data",
    "structure",
    "for",
    "estimating",
    "the",
    "similarity",
    "between",
    "documents",
];

// a distant paraphrase: low overlap with DOC1
const DOC3: [&str; 8] = [
    "comparing",
    "documents",
    "by",
    "their",
    "shingled",
    "token",
    "sets",
    "only",
];

// =============================================================================
// MinHash identity
// =============================================================================

#[test]
fn identical_token_streams_have_jaccard_one() {
    let m1 = minhash_of(&DOC1);
    let m2 = minhash_of(&DOC1);
    assert_eq!(m1.jaccard(&m2).unwrap(), 1.0);
    assert_eq!(m1, m2);
}

#[test]
fn overlapping_documents_estimate_their_overlap() {
    let m1 = minhash_of(&DOC1);
    let m2 = minhash_of(&DOC2);
    let exact = 11.0 / 13.0;
    let estimate = m1.jaccard(&m2).unwrap();
    assert!(
        (estimate - exact).abs() < 0.15,
        "estimate={estimate} exact={exact}"
    );
}

// =============================================================================
// HyperLogLog distinct counting
// =============================================================================

#[test]
fn repeated_tokens_count_distinct() {
    let mut hll = HyperLogLog::new(8).unwrap();
    for token in ["a", "b", "c", "a", "b", "c", "a"] {
        hll.digest(&Sha256::digest(token.as_bytes())).unwrap();
    }
    let estimate = hll.count();
    assert!(
        (2.0..=4.0).contains(&estimate),
        "estimate={estimate} for 3 distinct tokens"
    );
}

// =============================================================================
// LSH retrieval
// =============================================================================

#[test]
fn near_duplicate_is_retrieved() {
    let m1 = minhash_of(&DOC1);
    let m2 = minhash_of(&DOC2);
    let m3 = minhash_of(&DOC3);

    let mut lsh = MinHashLsh::new(0.5, 128, Weights::default()).unwrap();
    lsh.insert("m2", &m2).unwrap();
    lsh.insert("m3", &m3).unwrap();

    let result = lsh.query(&m1).unwrap();
    assert!(
        result.contains(&"m2".to_string()),
        "near-duplicate m2 missing from {result:?}"
    );
}

#[test]
fn solved_band_layout_is_stable_and_within_budget() {
    let lsh = MinHashLsh::new(0.5, 128, Weights::default()).unwrap();
    assert!(lsh.bands() * lsh.rows() <= 128);
    for _ in 0..3 {
        let again = MinHashLsh::new(0.5, 128, Weights::default()).unwrap();
        assert_eq!((again.bands(), again.rows()), (lsh.bands(), lsh.rows()));
    }
}

// =============================================================================
// b-bit projection
// =============================================================================

#[test]
fn one_bit_projection_separates_identical_from_unrelated() {
    let m1 = minhash_of(&DOC1);
    let m2 = minhash_of(&DOC1);
    let identical = BBitMinHash::new(1, &m1)
        .unwrap()
        .jaccard(&BBitMinHash::new(1, &m2).unwrap())
        .unwrap();
    assert_eq!(identical, 1.0);

    // unrelated sets collide on ~half their one-bit registers; the corrected
    // estimator must report near zero, not near one half
    let tokens_a: Vec<String> = (0..500).map(|i| format!("left-{i}")).collect();
    let tokens_b: Vec<String> = (0..500).map(|i| format!("right-{i}")).collect();
    let a = minhash_of(&tokens_a.iter().map(String::as_str).collect::<Vec<_>>());
    let b = minhash_of(&tokens_b.iter().map(String::as_str).collect::<Vec<_>>());
    let unrelated = BBitMinHash::new(1, &a)
        .unwrap()
        .jaccard(&BBitMinHash::new(1, &b).unwrap())
        .unwrap();
    assert!(unrelated < 0.35, "unrelated estimate={unrelated}");
}

// =============================================================================
// Serialization across mutation
// =============================================================================

#[test]
fn sketches_survive_dump_load_and_further_merging() {
    let mut m = minhash_of(&DOC1);
    let loaded = MinHash::from_bytes(&m.to_bytes()).unwrap();
    assert_eq!(loaded, m);

    // the loaded copy keeps working: merge new content into both and compare
    let other = minhash_of(&DOC3);
    let mut loaded = loaded;
    loaded.merge(&other).unwrap();
    m.merge(&other).unwrap();
    assert_eq!(loaded, m);
    assert_eq!(loaded.jaccard(&m).unwrap(), 1.0);
}

#[test]
fn every_sketch_kind_roundtrips() {
    let m = minhash_of(&DOC2);
    assert_eq!(MinHash::from_bytes(&m.to_bytes()).unwrap(), m);

    let projected = BBitMinHash::new(4, &m).unwrap();
    assert_eq!(
        BBitMinHash::from_bytes(&projected.to_bytes()).unwrap(),
        projected
    );

    let mut hll = HyperLogLog::new(10).unwrap();
    let mut pp = semblance::HyperLogLogPlusPlus::new(10).unwrap();
    for i in 0..1000u64 {
        let digest = Sha256::digest(i.to_le_bytes());
        hll.digest(&digest).unwrap();
        pp.digest(&digest).unwrap();
    }
    assert_eq!(HyperLogLog::from_bytes(&hll.to_bytes()).unwrap(), hll);
    assert_eq!(
        semblance::HyperLogLogPlusPlus::from_bytes(&pp.to_bytes()).unwrap(),
        pp
    );

    let mut lsh = MinHashLsh::new(0.5, 128, Weights::default()).unwrap();
    lsh.insert("m1", &minhash_of(&DOC1)).unwrap();
    lsh.insert("m3", &minhash_of(&DOC3)).unwrap();
    assert_eq!(MinHashLsh::from_bytes(&lsh.to_bytes()).unwrap(), lsh);
}

// =============================================================================
// Statistical accuracy
// =============================================================================

#[test]
fn jaccard_estimate_is_close_for_large_sets() {
    // |A| = |B| = 600, overlap 300: exact J = 300 / 900
    let exact = 300.0 / 900.0;
    let mut total = 0.0;
    for seed in 1..=3u32 {
        let mut a = MinHash::new(128, seed).unwrap();
        let mut b = MinHash::new(128, seed).unwrap();
        for i in 0..600 {
            a.digest(&Sha256::digest(format!("shared-{i}"))).unwrap();
        }
        for i in 300..900 {
            b.digest(&Sha256::digest(format!("shared-{i}"))).unwrap();
        }
        let estimate = a.jaccard(&b).unwrap();
        assert!(
            (estimate - exact).abs() <= 0.15,
            "seed={seed} estimate={estimate} exact={exact}"
        );
        total += estimate;
    }
    let mean = total / 3.0;
    assert!((mean - exact).abs() <= 0.1, "mean={mean} exact={exact}");
}

#[test]
fn cardinalities_are_close_for_large_streams() {
    let mut hll = HyperLogLog::new(12).unwrap();
    let mut pp = semblance::HyperLogLogPlusPlus::new(12).unwrap();
    let exact = 30_000u64;
    for i in 0..exact {
        let digest = Sha256::digest(format!("item-{i}"));
        hll.digest(&digest).unwrap();
        pp.digest(&digest).unwrap();
    }
    for (name, estimate) in [("hll", hll.count()), ("hll++", pp.count())] {
        let rel = (estimate - exact as f64).abs() / exact as f64;
        assert!(rel < 0.1, "{name} estimate={estimate} rel={rel}");
    }
}
