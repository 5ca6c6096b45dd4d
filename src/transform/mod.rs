//! Leakage-safe feature transforms.
//!
//! A transform learns its parameters from exactly one training subset. Once
//! fit, `transform` applies those parameters to any data without touching
//! them, and a second `fit` is refused.

pub mod scaler;

pub use scaler::StandardScaler;

use crate::error::Result;
use ndarray::{Array2, ArrayView2};

/// Stateful feature transform with an explicit fit step
pub trait Transformer {
    /// Learn parameters from training rows.
    ///
    /// Fails with `AlreadyFitted` if parameters were learned before.
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()>;

    /// Apply learned parameters.
    ///
    /// Fails with `NotFitted` before `fit`.
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn is_fitted(&self) -> bool;

    /// Fit on `x` and return the transformed rows
    fn fit_transform(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
