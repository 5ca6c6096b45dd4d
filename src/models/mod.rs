//! Classifiers and the capability interface every prepared strategy exposes

pub mod cv;
pub mod linalg;
pub mod logistic;

pub use cv::{CandidateScore, CvOutcome, LogisticRegressionCv, PreparedFold};
pub use logistic::LogisticRegression;

use crate::error::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Binary classifier with a real-valued decision function.
///
/// Positive scores predict fraud. Implementations are fit once on training
/// data and then only queried.
pub trait Classifier {
    /// Fit on raw training rows and their labels
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()>;

    /// Decision function, one score per row
    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Hard labels at the decision boundary
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>> {
        Ok(labels_from_scores(self.predict_score(x)?.view()))
    }
}

/// Fraud where the decision function is positive
pub fn labels_from_scores(scores: ArrayView1<f64>) -> Array1<u8> {
    scores.mapv(|s| u8::from(s > 0.0))
}
