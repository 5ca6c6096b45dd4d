//! Standardization to zero mean and unit variance

use super::Transformer;
use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Learned per-column statistics
#[derive(Debug, Clone, PartialEq)]
struct ScalerParams {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

/// Z-score scaler: `(x - mean) / std`, statistics from the fit rows only.
///
/// Columns with zero variance keep a scale of 1 so they map to 0.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned column means
    pub fn mean(&self) -> Result<&Array1<f64>> {
        self.params
            .as_ref()
            .map(|p| &p.mean)
            .ok_or(HarnessError::NotFitted {
                component: "StandardScaler",
            })
    }

    /// Learned column standard deviations (population)
    pub fn scale(&self) -> Result<&Array1<f64>> {
        self.params
            .as_ref()
            .map(|p| &p.scale)
            .ok_or(HarnessError::NotFitted {
                component: "StandardScaler",
            })
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        if self.params.is_some() {
            return Err(HarnessError::AlreadyFitted {
                component: "StandardScaler",
            });
        }
        if x.nrows() == 0 {
            return Err(HarnessError::precondition("cannot fit scaler on zero rows"));
        }

        let n = x.nrows() as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let mut var = Array1::<f64>::zeros(x.ncols());
        for row in x.rows() {
            for ((v, &value), &m) in var.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let d = value - m;
                *v += d * d;
            }
        }
        let scale = var.mapv(|v| {
            let std = (v / n).sqrt();
            if std > f64::EPSILON {
                std
            } else {
                1.0
            }
        });

        self.params = Some(ScalerParams { mean, scale });
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(HarnessError::NotFitted {
            component: "StandardScaler",
        })?;
        if x.ncols() != params.mean.len() {
            return Err(HarnessError::DimensionMismatch {
                context: "scaler columns",
                expected: params.mean.len(),
                actual: x.ncols(),
            });
        }

        Ok((&x - &params.mean) / &params.scale)
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::stratified_split;
    use crate::synth::SyntheticGenerator;
    use ndarray::{array, concatenate};

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x.view()).unwrap();

        assert_eq!(scaler.mean().unwrap(), &array![2.0, 10.0]);
        let std = (2.0f64 / 3.0).sqrt();
        assert!((scaled[[0, 0]] + 1.0 / std).abs() < 1e-12);
        assert!((scaled[[2, 0]] - 1.0 / std).abs() < 1e-12);
        // constant column maps to zero
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let scaler = StandardScaler::new();
        let err = scaler.transform(array![[1.0]].view()).unwrap_err();
        assert!(matches!(err, HarnessError::NotFitted { .. }));
        assert!(scaler.mean().is_err());
    }

    #[test]
    fn test_transform_does_not_touch_params() {
        let mut scaler = StandardScaler::new();
        scaler.fit(array![[0.0], [2.0]].view()).unwrap();
        let before = scaler.mean().unwrap().clone();

        let out = scaler.transform(array![[100.0], [200.0]].view()).unwrap();
        assert_eq!(out, array![[100.0 - 1.0], [199.0]]);
        assert_eq!(scaler.mean().unwrap(), &before);
    }

    #[test]
    fn test_params_independent_of_test_data() {
        let ds = SyntheticGenerator::new(21).dataset(1_800, 200).unwrap();
        let split = stratified_split(&ds, 0.2, 5).unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit_transform(split.train.features()).unwrap();
        let mean = scaler.mean().unwrap().clone();
        let scale = scaler.scale().unwrap().clone();

        // a refit on train + test is refused and leaves parameters intact
        let union = concatenate(
            ndarray::Axis(0),
            &[split.train.features(), split.test.features()],
        )
        .unwrap();
        let err = scaler.fit(union.view()).unwrap_err();
        assert!(matches!(err, HarnessError::AlreadyFitted { .. }));
        scaler.transform(split.test.features()).unwrap();

        let mut fresh = StandardScaler::new();
        fresh.fit(split.train.features()).unwrap();

        assert_eq!(scaler.mean().unwrap(), &mean);
        assert_eq!(scaler.scale().unwrap(), &scale);
        assert_eq!(fresh.mean().unwrap(), &mean);
        assert_eq!(fresh.scale().unwrap(), &scale);
    }

    #[test]
    fn test_column_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(matches!(
            scaler.transform(array![[1.0]].view()).unwrap_err(),
            HarnessError::DimensionMismatch { .. }
        ));
    }
}
