//! Synthetic minority oversampling

use super::neighbors::KdTree;
use super::{class_roles, Provenance, Resampled, Sampler};
use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// SMOTE: new minority rows on segments between a minority row and one of
/// its `k_neighbors` nearest minority neighbours, until both classes are
/// the same size.
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
}

impl Smote {
    pub fn new(k_neighbors: usize) -> Self {
        Self { k_neighbors }
    }
}

impl Sampler for Smote {
    fn resample(&self, x: ArrayView2<f64>, y: ArrayView1<u8>, rng: &mut ChaCha8Rng) -> Result<Resampled> {
        let roles = class_roles(x, y)?;
        if roles.minority_count < 2 {
            return Err(HarnessError::precondition(format!(
                "SMOTE needs at least 2 minority rows, got {}",
                roles.minority_count
            )));
        }
        if self.k_neighbors == 0 {
            return Err(HarnessError::precondition("SMOTE needs k_neighbors >= 1"));
        }

        let minority_rows: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == roles.minority)
            .map(|(i, _)| i)
            .collect();
        let minority = x.select(Axis(0), &minority_rows);
        let k = self.k_neighbors.min(minority_rows.len() - 1);

        let tree = KdTree::build(minority.view())?;
        let mut neighbors = Vec::with_capacity(minority_rows.len());
        for i in 0..minority_rows.len() {
            let found = tree.nearest(minority.row(i), k, Some(i))?;
            neighbors.push(found.into_iter().map(|n| n.index).collect::<Vec<_>>());
        }

        let n_new = roles.majority_count - roles.minority_count;
        let n = x.nrows();
        let mut features = Array2::<f64>::zeros((n + n_new, x.ncols()));
        features.slice_mut(ndarray::s![..n, ..]).assign(&x);
        let mut labels = Array1::<u8>::from_elem(n + n_new, roles.minority);
        labels.slice_mut(ndarray::s![..n]).assign(&y);
        let mut provenance: Vec<Provenance> = (0..n).map(Provenance::Original).collect();

        for out in n..n + n_new {
            let base = rng.gen_range(0..minority_rows.len());
            let neighbor = neighbors[base][rng.gen_range(0..k)];
            let gap: f64 = rng.gen();

            let from = minority.row(base);
            let to = minority.row(neighbor);
            for ((dst, &a), &b) in features.row_mut(out).iter_mut().zip(from.iter()).zip(to.iter()) {
                *dst = a + gap * (b - a);
            }
            provenance.push(Provenance::Synthetic {
                base: minority_rows[base],
                neighbor: minority_rows[neighbor],
            });
        }

        debug!(
            minority = roles.minority_count,
            majority = roles.majority_count,
            synthetic = n_new,
            k,
            "SMOTE resampled"
        );

        Ok(Resampled {
            features,
            labels,
            provenance,
        })
    }

    fn name(&self) -> &'static str {
        "smote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SyntheticGenerator;
    use crate::types::transaction::{FRAUD, NORMAL};
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_balances_classes() {
        let ds = SyntheticGenerator::new(1).dataset(400, 25).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let out = Smote::new(5).resample(ds.features(), ds.labels(), &mut rng).unwrap();

        let counts = out.class_counts().unwrap();
        assert_eq!(counts.normal, 400);
        assert_eq!(counts.fraud, 400);
        assert_eq!(out.provenance.iter().filter(|p| p.is_synthetic()).count(), 375);
        // original rows come first, unchanged
        assert_eq!(out.features.row(10), ds.features().row(10));
    }

    #[test]
    fn test_synthetic_rows_lie_between_minority_parents() {
        let x = array![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [5.0, 5.0], [6.0, 5.0], [7.0, 5.0]];
        let y = array![FRAUD, FRAUD, NORMAL, NORMAL, NORMAL, NORMAL];
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let out = Smote::new(5).resample(x.view(), y.view(), &mut rng).unwrap();

        for (row, provenance) in out.provenance.iter().enumerate() {
            if let Provenance::Synthetic { base, neighbor } = *provenance {
                assert_eq!(y[base], FRAUD);
                assert_eq!(y[neighbor], FRAUD);
                assert_eq!(out.labels[row], FRAUD);
                // only two minority rows: every synthetic row is on the x axis
                assert_eq!(out.features[[row, 1]], 0.0);
                assert!((0.0..=10.0).contains(&out.features[[row, 0]]));
            }
        }
    }

    #[test]
    fn test_same_seed_same_rows() {
        let ds = SyntheticGenerator::new(2).dataset(200, 20).unwrap();
        let a = Smote::new(3)
            .resample(ds.features(), ds.labels(), &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        let b = Smote::new(3)
            .resample(ds.features(), ds.labels(), &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a.features, b.features);
        assert_eq!(a.provenance, b.provenance);
    }

    #[test]
    fn test_single_minority_row_fails() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![FRAUD, NORMAL, NORMAL];
        let err = Smote::new(5)
            .resample(x.view(), y.view(), &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }
}
