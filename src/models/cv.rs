//! Cross-validated choice of the regularization strength

use super::logistic::LogisticRegression;
use super::Classifier;
use crate::error::{HarnessError, Result};
use crate::metrics::average_precision;
use crate::split::{Fold, StratifiedKFold};
use crate::types::dataset::check_rows;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use tracing::{debug, info};

/// Fold matrices ready for fitting and scoring
#[derive(Debug, Clone)]
pub struct PreparedFold {
    pub train_x: Array2<f64>,
    pub train_y: Array1<u8>,
    pub validation_x: Array2<f64>,
    pub validation_y: Array1<u8>,
}

impl PreparedFold {
    /// Plain row selection with no per-fold preparation
    pub fn select(x: ArrayView2<f64>, y: ArrayView1<u8>, fold: &Fold) -> Self {
        Self {
            train_x: x.select(Axis(0), &fold.train),
            train_y: y.select(Axis(0), &fold.train),
            validation_x: x.select(Axis(0), &fold.validation),
            validation_y: y.select(Axis(0), &fold.validation),
        }
    }
}

/// Validation scores of one candidate C
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub c: f64,
    pub fold_scores: Vec<f64>,
    pub mean: f64,
}

/// Result of a grid search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvOutcome {
    pub candidates: Vec<CandidateScore>,
    pub best_c: f64,
}

/// Logistic regression whose C is picked by mean fold average precision.
///
/// [`search`](Self::search) takes a per-fold preparation step so that callers
/// can learn sampling and scaling inside each fold; the plain
/// [`Classifier::fit`] path uses the rows as given.
#[derive(Debug, Clone)]
pub struct LogisticRegressionCv {
    c_grid: Vec<f64>,
    kfold: StratifiedKFold,
    max_iter: usize,
    tol: f64,
    outcome: Option<CvOutcome>,
    model: Option<LogisticRegression>,
}

impl LogisticRegressionCv {
    pub fn new(c_grid: Vec<f64>, kfold: StratifiedKFold, max_iter: usize, tol: f64) -> Self {
        Self {
            c_grid,
            kfold,
            max_iter,
            tol,
            outcome: None,
            model: None,
        }
    }

    pub fn folds(&self) -> usize {
        self.kfold.k()
    }

    /// Score every candidate C on every fold.
    ///
    /// `prepare` is called once per fold and its output is shared by all
    /// candidates. Ties go to the candidate listed first in the grid.
    pub fn search<F>(&self, y: ArrayView1<u8>, mut prepare: F) -> Result<CvOutcome>
    where
        F: FnMut(usize, &Fold) -> Result<PreparedFold>,
    {
        if self.c_grid.is_empty() {
            return Err(HarnessError::precondition("C grid is empty"));
        }

        let folds = self.kfold.split(y)?;
        let mut fold_scores = vec![Vec::with_capacity(folds.len()); self.c_grid.len()];

        for (index, fold) in folds.iter().enumerate() {
            let prepared = prepare(index, fold)?;
            for (scores, &c) in fold_scores.iter_mut().zip(self.c_grid.iter()) {
                let mut model = LogisticRegression::new(c, self.max_iter, self.tol);
                model.fit(prepared.train_x.view(), prepared.train_y.view())?;
                let decision = model.predict_score(prepared.validation_x.view())?;
                let ap = average_precision(decision.view(), prepared.validation_y.view())?;
                debug!(fold = index, c, average_precision = ap, "Fold scored");
                scores.push(ap);
            }
        }

        let candidates: Vec<CandidateScore> = self
            .c_grid
            .iter()
            .zip(fold_scores)
            .map(|(&c, scores)| {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                CandidateScore {
                    c,
                    fold_scores: scores,
                    mean,
                }
            })
            .collect();

        let mut best = &candidates[0];
        for candidate in &candidates[1..] {
            if candidate.mean > best.mean {
                best = candidate;
            }
        }
        let best_c = best.c;

        info!(
            best_c,
            mean_average_precision = format!("{:.4}", best.mean),
            folds = folds.len(),
            "Cross-validation finished"
        );

        Ok(CvOutcome { candidates, best_c })
    }

    /// Fit the final model with the searched C on already-prepared rows
    pub fn refit(&mut self, outcome: CvOutcome, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        let mut model = LogisticRegression::new(outcome.best_c, self.max_iter, self.tol);
        model.fit(x, y)?;
        self.model = Some(model);
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn outcome(&self) -> Option<&CvOutcome> {
        self.outcome.as_ref()
    }

    /// The refit estimator
    pub fn model(&self) -> Result<&LogisticRegression> {
        self.model.as_ref().ok_or(HarnessError::NotFitted {
            component: "LogisticRegressionCv",
        })
    }
}

impl Classifier for LogisticRegressionCv {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        check_rows(x, y)?;
        let outcome = self.search(y, |_, fold| Ok(PreparedFold::select(x, y, fold)))?;
        self.refit(outcome, x, y)
    }

    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.model()?.predict_score(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SyntheticGenerator;

    fn grid_search() -> LogisticRegressionCv {
        LogisticRegressionCv::new(
            vec![0.001, 0.1, 10.0],
            StratifiedKFold::new(3, 7),
            100,
            1e-6,
        )
    }

    #[test]
    fn test_selects_from_grid_and_refits() {
        let ds = SyntheticGenerator::new(12).dataset(600, 60).unwrap();
        let mut model = grid_search();
        model.fit(ds.features(), ds.labels()).unwrap();

        let outcome = model.outcome().unwrap();
        assert_eq!(outcome.candidates.len(), 3);
        assert!(outcome.candidates.iter().all(|c| c.fold_scores.len() == 3));
        assert!([0.001, 0.1, 10.0].contains(&outcome.best_c));
        assert_eq!(model.model().unwrap().c(), outcome.best_c);

        let best_mean = outcome
            .candidates
            .iter()
            .map(|c| c.mean)
            .fold(f64::NEG_INFINITY, f64::max);
        let chosen = outcome.candidates.iter().find(|c| c.c == outcome.best_c).unwrap();
        assert_eq!(chosen.mean, best_mean);
        assert_eq!(model.predict(ds.features()).unwrap().len(), ds.len());
    }

    #[test]
    fn test_prepare_called_once_per_fold() {
        let ds = SyntheticGenerator::new(13).dataset(300, 30).unwrap();
        let search = grid_search();
        let mut seen = Vec::new();
        search
            .search(ds.labels(), |index, fold| {
                seen.push(index);
                Ok(PreparedFold::select(ds.features(), ds.labels(), fold))
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_grid_fails() {
        let ds = SyntheticGenerator::new(14).dataset(100, 10).unwrap();
        let search = LogisticRegressionCv::new(vec![], StratifiedKFold::new(3, 1), 10, 1e-6);
        assert!(search
            .search(ds.labels(), |_, fold| Ok(PreparedFold::select(ds.features(), ds.labels(), fold)))
            .is_err());
    }
}
