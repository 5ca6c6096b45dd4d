//! Sampler, scaler and estimator fit as one unit inside cross-validation

use crate::error::{HarnessError, Result};
use crate::models::{Classifier, CvOutcome, LogisticRegressionCv, PreparedFold};
use crate::sampling::{Provenance, Resampled, Sampler};
use crate::transform::{StandardScaler, Transformer};
use crate::types::dataset::check_rows;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// What the sampler saw in one cross-validation round, in caller row indices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldAudit {
    pub fold: usize,
    pub validation: Vec<usize>,
    /// Rows that contributed to at least one sampler output row
    pub sampler_sources: BTreeSet<usize>,
    pub sampler_output_rows: usize,
    pub synthetic_rows: usize,
}

impl FoldAudit {
    /// Validation rows that reached the sampler
    pub fn leaked_rows(&self) -> Vec<usize> {
        self.validation
            .iter()
            .copied()
            .filter(|row| self.sampler_sources.contains(row))
            .collect()
    }
}

/// Resample, scale and classify, all learned from training rows only.
///
/// During fitting, every stratified fold resamples its own training part and
/// fits a fresh scaler on the result; the validation part is only scaled.
/// C is chosen by mean fold average precision, then the whole chain is refit
/// on every training row. Prediction scales raw rows and never resamples.
pub struct SamplingPipeline {
    sampler: Box<dyn Sampler>,
    estimator: LogisticRegressionCv,
    seed: u64,
    scaler: Option<StandardScaler>,
    audits: Vec<FoldAudit>,
}

impl SamplingPipeline {
    pub fn new(sampler: Box<dyn Sampler>, estimator: LogisticRegressionCv, seed: u64) -> Self {
        Self {
            sampler,
            estimator,
            seed,
            scaler: None,
            audits: Vec::new(),
        }
    }

    pub fn sampler_name(&self) -> &'static str {
        self.sampler.name()
    }

    pub fn folds(&self) -> usize {
        self.estimator.folds()
    }

    /// One audit per cross-validation round, empty before `fit`
    pub fn fold_audits(&self) -> &[FoldAudit] {
        &self.audits
    }

    pub fn cv_outcome(&self) -> Option<&CvOutcome> {
        self.estimator.outcome()
    }
}

/// Resample the caller rows `sampler_rows` and audit them against `validation`.
///
/// Sources in the audit are the ids of the rows actually handed to the
/// sampler. Every output row the sampler reports as an original must equal
/// the input row it names.
pub fn resample_fold(
    sampler: &dyn Sampler,
    x: ArrayView2<f64>,
    y: ArrayView1<u8>,
    fold: usize,
    sampler_rows: &[usize],
    validation: &[usize],
    rng: &mut ChaCha8Rng,
) -> Result<(Resampled, FoldAudit)> {
    let input_x = x.select(Axis(0), sampler_rows);
    let input_y = y.select(Axis(0), sampler_rows);
    let resampled = sampler.resample(input_x.view(), input_y.view(), rng)?;

    for (out, provenance) in resampled.provenance.iter().enumerate() {
        if let Provenance::Original(local) = *provenance {
            let matches = sampler_rows
                .get(local)
                .is_some_and(|&row| resampled.features.row(out) == x.row(row));
            if !matches {
                return Err(HarnessError::precondition(format!(
                    "{} output row {} does not match its source row {}",
                    sampler.name(),
                    out,
                    local
                )));
            }
        }
    }

    let audit = FoldAudit {
        fold,
        validation: validation.to_vec(),
        sampler_sources: resampled
            .source_indices()
            .into_iter()
            .filter_map(|local| sampler_rows.get(local).copied())
            .collect(),
        sampler_output_rows: resampled.len(),
        synthetic_rows: resampled.provenance.iter().filter(|p| p.is_synthetic()).count(),
    };
    Ok((resampled, audit))
}

impl Classifier for SamplingPipeline {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        if self.scaler.is_some() {
            return Err(HarnessError::AlreadyFitted {
                component: "SamplingPipeline",
            });
        }
        check_rows(x, y)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut audits = Vec::new();
        let sampler = &self.sampler;

        let outcome = self.estimator.search(y, |index, fold| {
            let (resampled, audit) = resample_fold(
                &**sampler,
                x,
                y,
                index,
                &fold.train,
                &fold.validation,
                &mut rng,
            )?;
            debug!(
                fold = index,
                sampler_input = fold.train.len(),
                sampler_output = audit.sampler_output_rows,
                synthetic = audit.synthetic_rows,
                "Fold resampled"
            );
            audits.push(audit);

            let mut scaler = StandardScaler::new();
            let train_scaled = scaler.fit_transform(resampled.features.view())?;
            let validation_x = scaler.transform(x.select(Axis(0), &fold.validation).view())?;

            Ok(PreparedFold {
                train_x: train_scaled,
                train_y: resampled.labels,
                validation_x,
                validation_y: y.select(Axis(0), &fold.validation),
            })
        })?;

        let resampled = self.sampler.resample(x, y, &mut rng)?;
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(resampled.features.view())?;
        self.estimator.refit(outcome, scaled.view(), resampled.labels.view())?;

        info!(
            sampler = self.sampler.name(),
            training_rows = x.nrows(),
            resampled_rows = resampled.len(),
            best_c = ?self.estimator.outcome().map(|o| o.best_c),
            "Sampling pipeline fitted"
        );

        self.scaler = Some(scaler);
        self.audits = audits;
        Ok(())
    }

    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let scaler = self.scaler.as_ref().ok_or(HarnessError::NotFitted {
            component: "SamplingPipeline",
        })?;
        let scaled = scaler.transform(x)?;
        self.estimator.predict_score(scaled.view())
    }
}
