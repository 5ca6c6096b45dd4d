//! In-memory labelled feature table

use crate::error::{HarnessError, Result};
use crate::feature_extractor::{FeatureExtractor, FEATURE_COUNT};
use crate::types::transaction::{TransactionRecord, FRAUD, NORMAL};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

/// Per-class row counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub normal: usize,
    pub fraud: usize,
}

impl ClassCounts {
    /// Count labels; any label other than 0 or 1 is a precondition error
    pub fn from_labels(labels: ArrayView1<u8>) -> Result<Self> {
        let mut counts = ClassCounts::default();
        for (row, &label) in labels.iter().enumerate() {
            match label {
                NORMAL => counts.normal += 1,
                FRAUD => counts.fraud += 1,
                other => {
                    return Err(HarnessError::precondition(format!(
                        "row {} has label {}, expected 0 or 1",
                        row, other
                    )))
                }
            }
        }
        Ok(counts)
    }

    pub fn total(&self) -> usize {
        self.normal + self.fraud
    }

    /// Fraction of fraud rows; 0 for an empty set
    pub fn fraud_ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.fraud as f64 / self.total() as f64
        }
    }

    pub fn get(&self, class: u8) -> usize {
        if class == FRAUD {
            self.fraud
        } else {
            self.normal
        }
    }
}

/// Feature matrix with one binary label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<u8>,
    counts: ClassCounts,
}

impl Dataset {
    /// Build a dataset, checking shapes, labels and that every feature is finite
    pub fn new(features: Array2<f64>, labels: Array1<u8>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(HarnessError::DimensionMismatch {
                context: "dataset labels",
                expected: features.nrows(),
                actual: labels.len(),
            });
        }
        if let Some(((row, column), value)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(HarnessError::precondition(format!(
                "non-finite value {} at row {}, column {}",
                value, row, column
            )));
        }
        let counts = ClassCounts::from_labels(labels.view())?;
        Ok(Self {
            features,
            labels,
            counts,
        })
    }

    /// Build a dataset from parsed transaction records
    pub fn from_records(records: &[TransactionRecord]) -> Result<Self> {
        let extractor = FeatureExtractor::new();
        let mut features = Array2::<f64>::zeros((records.len(), FEATURE_COUNT));
        let mut labels = Array1::<u8>::zeros(records.len());

        for (i, record) in records.iter().enumerate() {
            for (j, v) in extractor.extract(record).into_iter().enumerate() {
                features[[i, j]] = v;
            }
            labels[i] = record.class;
        }

        Self::new(features, labels)
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, u8> {
        self.labels.view()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn class_counts(&self) -> ClassCounts {
        self.counts
    }

    pub fn fraud_ratio(&self) -> f64 {
        self.counts.fraud_ratio()
    }

    /// Row indices carrying the given label, in ascending order
    pub fn class_indices(&self, class: u8) -> Vec<usize> {
        class_indices(self.labels.view(), class)
    }

    /// Copy the given rows into a new dataset
    pub fn select(&self, indices: &[usize]) -> Dataset {
        let features = self.features.select(Axis(0), indices);
        let labels = self.labels.select(Axis(0), indices);
        let counts = ClassCounts {
            fraud: labels.iter().filter(|&&l| l == FRAUD).count(),
            normal: labels.iter().filter(|&&l| l == NORMAL).count(),
        };
        Dataset {
            features,
            labels,
            counts,
        }
    }
}

/// Row indices carrying the given label, in ascending order
pub fn class_indices(labels: ArrayView1<u8>, class: u8) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == class)
        .map(|(i, _)| i)
        .collect()
}

/// Check that a feature matrix and label vector describe the same rows
pub fn check_rows(x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(HarnessError::DimensionMismatch {
            context: "feature rows vs labels",
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_counts_and_ratio() {
        let ds = Dataset::new(
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]],
            array![0, 0, 1, 0],
        )
        .unwrap();

        assert_eq!(ds.class_counts(), ClassCounts { normal: 3, fraud: 1 });
        assert!((ds.fraud_ratio() - 0.25).abs() < 1e-12);
        assert_eq!(ds.class_indices(FRAUD), vec![2]);
    }

    #[test]
    fn test_rejects_bad_labels() {
        let err = Dataset::new(array![[1.0], [2.0]], array![0, 2]).unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));

        let err = Dataset::new(array![[1.0], [2.0]], array![0]).unwrap_err();
        assert!(matches!(err, HarnessError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_select() {
        let ds = Dataset::new(array![[1.0], [2.0], [3.0]], array![0, 1, 0]).unwrap();
        let picked = ds.select(&[2, 1]);
        assert_eq!(picked.features(), array![[3.0], [2.0]]);
        assert_eq!(picked.class_counts(), ClassCounts { normal: 1, fraud: 1 });
    }

    #[test]
    fn test_rejects_non_finite_features() {
        let err = Dataset::new(array![[1.0, 2.0], [3.0, f64::NAN]], array![0, 1]).unwrap_err();
        match err {
            HarnessError::Precondition(msg) => assert!(msg.contains("row 1, column 1"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }

        let err = Dataset::new(array![[f64::INFINITY], [0.0]], array![0, 1]).unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            TransactionRecord::new(0.0, 10.0, NORMAL),
            TransactionRecord::new(1.0, 20.0, FRAUD),
        ];
        let ds = Dataset::from_records(&records).unwrap();
        assert_eq!(ds.n_features(), FEATURE_COUNT);
        assert_eq!(ds.features()[[1, 0]], 1.0);
        assert_eq!(ds.features()[[1, 29]], 20.0);
        assert_eq!(ds.labels()[1], FRAUD);
    }
}
