//! Seeded train/test and k-fold splits over row indices.
//!
//! Splits work on indices so the same partition can be re-derived later
//! from `(n, fraction, seed)` alone, e.g. when evaluating a saved model.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use farelab_core::rng::SeedTree;

/// Parameters that fully determine a hold-out split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub test_fraction: f64,
    pub seed: u64,
}

/// Row indices of a hold-out split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTest {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn shuffled(n: usize, seed: u64, scope: &str) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = SeedTree::new(seed).rng_for(scope, 0);
    idx.shuffle(&mut rng);
    idx
}

/// Shuffle `0..n` and cut off `test_fraction` of it.
///
/// With at least two rows both sides get at least one row.
pub fn train_test_split(n: usize, spec: SplitSpec) -> TrainTest {
    let idx = shuffled(n, spec.seed, "split.holdout");
    let mut n_test = (n as f64 * spec.test_fraction).round() as usize;
    if n >= 2 {
        n_test = n_test.clamp(1, n - 1);
    } else {
        n_test = 0;
    }
    let (test, train) = idx.split_at(n_test);
    TrainTest {
        train: train.to_vec(),
        test: test.to_vec(),
    }
}

/// `k` folds over `0..n` as `(train, validation)` pairs.
///
/// Fold sizes differ by at most one. Every index is in exactly one
/// validation fold.
pub fn k_fold(n: usize, k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let k = k.clamp(1, n.max(1));
    let idx = shuffled(n, seed, "split.kfold");
    let base = n / k;
    let extra = n % k;

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let len = base + usize::from(f < extra);
        let valid = idx[start..start + len].to_vec();
        let train = idx[..start]
            .iter()
            .chain(&idx[start + len..])
            .copied()
            .collect();
        folds.push((train, valid));
        start += len;
    }
    folds
}
