//! Stratified train/test splitting and k-fold generation.

use crate::error::{HarnessError, Result};
use crate::types::dataset::{class_indices, Dataset};
use crate::types::transaction::{FRAUD, NORMAL};
use ndarray::ArrayView1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

const CLASSES: [u8; 2] = [NORMAL, FRAUD];

/// Disjoint train/test partition of a dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Dataset,
    pub test: Dataset,
    /// Source row of each training row
    pub train_indices: Vec<usize>,
    /// Source row of each test row
    pub test_indices: Vec<usize>,
}

/// Split `dataset` so that both subsets keep the full set's class ratio.
///
/// The test set holds `ceil(test_fraction * n)` rows, shared between classes
/// in proportion to their size with largest-remainder rounding. Each class is
/// shuffled independently with a seeded RNG.
pub fn stratified_split(dataset: &Dataset, test_fraction: f64, seed: u64) -> Result<DatasetSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(HarnessError::precondition(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let counts = dataset.class_counts();
    let n = counts.total();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    let per_class = allocate(&[counts.normal, counts.fraud], n_test);

    for (&class, &test_count) in CLASSES.iter().zip(per_class.iter()) {
        let total = counts.get(class);
        if test_count < 1 || total - test_count < 1 {
            return Err(HarnessError::precondition(format!(
                "test fraction {} leaves class {} with {} test and {} train rows",
                test_fraction,
                class,
                test_count,
                total - test_count
            )));
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(n - n_test);
    let mut test_indices = Vec::with_capacity(n_test);

    for (&class, &test_count) in CLASSES.iter().zip(per_class.iter()) {
        let mut rows = dataset.class_indices(class);
        rows.shuffle(&mut rng);
        test_indices.extend_from_slice(&rows[..test_count]);
        train_indices.extend_from_slice(&rows[test_count..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    let train = dataset.select(&train_indices);
    let test = dataset.select(&test_indices);

    info!(
        train = train.len(),
        train_fraud = train.class_counts().fraud,
        test = test.len(),
        test_fraud = test.class_counts().fraud,
        "Stratified split"
    );

    Ok(DatasetSplit {
        train,
        test,
        train_indices,
        test_indices,
    })
}

/// Share `total` among groups in proportion to `sizes` using largest remainders.
fn allocate(sizes: &[usize], total: usize) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    if n == 0 {
        return vec![0; sizes.len()];
    }

    let exact: Vec<f64> = sizes
        .iter()
        .map(|&s| total as f64 * s as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut remaining = total.saturating_sub(alloc.iter().sum());

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });

    for &i in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        if alloc[i] < sizes[i] {
            alloc[i] += 1;
            remaining -= 1;
        }
    }

    alloc
}

/// One cross-validation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Stratified k-fold generator: each class is shuffled and dealt round-robin.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    k: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(k: usize, seed: u64) -> Self {
        Self { k, seed }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Produce `k` folds over the row indices of `labels`
    pub fn split(&self, labels: ArrayView1<u8>) -> Result<Vec<Fold>> {
        if self.k < 2 {
            return Err(HarnessError::precondition(format!(
                "k-fold needs at least 2 folds, got {}",
                self.k
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];

        for class in CLASSES {
            let mut rows = class_indices(labels, class);
            if rows.len() < self.k {
                return Err(HarnessError::precondition(format!(
                    "class {} has {} rows, fewer than {} folds",
                    class,
                    rows.len(),
                    self.k
                )));
            }
            rows.shuffle(&mut rng);
            for (position, row) in rows.into_iter().enumerate() {
                assignment[row] = position % self.k;
            }
        }

        let folds = (0..self.k)
            .map(|fold| {
                let (validation, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&row| assignment[row] == fold);
                Fold { train, validation }
            })
            .collect();

        Ok(folds)
    }
}
