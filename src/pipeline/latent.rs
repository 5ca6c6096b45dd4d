//! Classification on autoencoder latent features

use crate::autoencoder::{EpochLoss, LatentEncoder, StopReason};
use crate::config::{AutoencoderConfig, EstimatorConfig};
use crate::error::{HarnessError, Result};
use crate::models::{Classifier, LogisticRegression};
use crate::transform::{StandardScaler, Transformer};
use crate::types::dataset::{check_rows, class_indices, ClassCounts};
use crate::types::transaction::{FRAUD, NORMAL};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Stages learned by one successful `fit`
struct FittedStages {
    scaler: StandardScaler,
    encoder: LatentEncoder,
    classifier: LogisticRegression,
}

/// Scaler, then frozen encoder, then logistic regression.
///
/// The training normals are split in two disjoint shares: one trains the
/// autoencoder, the other (together with every training fraud) trains the
/// classifier on latent features.
pub struct LatentPipeline {
    autoencoder: AutoencoderConfig,
    estimator: EstimatorConfig,
    fitted: Option<FittedStages>,
    autoencoder_rows: Vec<usize>,
    classifier_rows: Vec<usize>,
}

impl LatentPipeline {
    pub fn new(autoencoder: &AutoencoderConfig, estimator: &EstimatorConfig) -> Self {
        Self {
            autoencoder: autoencoder.clone(),
            estimator: estimator.clone(),
            fitted: None,
            autoencoder_rows: Vec::new(),
            classifier_rows: Vec::new(),
        }
    }

    /// Training rows shown to the autoencoder
    pub fn autoencoder_rows(&self) -> &[usize] {
        &self.autoencoder_rows
    }

    /// Training rows used to fit the classifier
    pub fn classifier_rows(&self) -> &[usize] {
        &self.classifier_rows
    }

    /// Autoencoder loss curve, empty before `fit`
    pub fn history(&self) -> &[EpochLoss] {
        self.fitted
            .as_ref()
            .map(|stages| stages.encoder.history())
            .unwrap_or(&[])
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.fitted
            .as_ref()
            .and_then(|stages| stages.encoder.stop_reason())
    }

    /// Split training normals into disjoint autoencoder and classifier shares
    fn partition(&self, y: ArrayView1<u8>) -> Result<(Vec<usize>, Vec<usize>)> {
        let fraction = self.autoencoder.normal_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(HarnessError::precondition(format!(
                "normal fraction must be in (0, 1), got {}",
                fraction
            )));
        }

        let mut normals = class_indices(y, NORMAL);
        let n_autoencoder = (fraction * normals.len() as f64).round() as usize;
        if n_autoencoder < 2 || n_autoencoder >= normals.len() {
            return Err(HarnessError::precondition(format!(
                "normal fraction {} of {} normals leaves no usable share",
                fraction,
                normals.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.autoencoder.seed);
        normals.shuffle(&mut rng);

        let mut autoencoder_rows = normals[..n_autoencoder].to_vec();
        let mut classifier_rows = normals[n_autoencoder..].to_vec();
        classifier_rows.extend(class_indices(y, FRAUD));
        autoencoder_rows.sort_unstable();
        classifier_rows.sort_unstable();
        Ok((autoencoder_rows, classifier_rows))
    }
}

impl Classifier for LatentPipeline {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        if self.fitted.is_some() {
            return Err(HarnessError::AlreadyFitted {
                component: "LatentPipeline",
            });
        }
        check_rows(x, y)?;
        let counts = ClassCounts::from_labels(y)?;
        if counts.fraud == 0 {
            return Err(HarnessError::precondition("latent pipeline needs training frauds"));
        }

        let (autoencoder_rows, classifier_rows) = self.partition(y)?;

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x)?;

        let mut encoder = LatentEncoder::new(self.autoencoder.clone());
        encoder.fit(scaled.select(Axis(0), &autoencoder_rows).view())?;
        let latent = encoder.transform(scaled.select(Axis(0), &classifier_rows).view())?;

        let est = &self.estimator;
        let mut classifier = LogisticRegression::new(est.c, est.max_iter, est.tol);
        classifier.fit(latent.view(), y.select(Axis(0), &classifier_rows).view())?;

        info!(
            autoencoder_rows = autoencoder_rows.len(),
            classifier_rows = classifier_rows.len(),
            latent_dim = latent.ncols(),
            epochs = encoder.history().len(),
            "Latent pipeline fitted"
        );

        self.fitted = Some(FittedStages {
            scaler,
            encoder,
            classifier,
        });
        self.autoencoder_rows = autoencoder_rows;
        self.classifier_rows = classifier_rows;
        Ok(())
    }

    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let stages = self.fitted.as_ref().ok_or(HarnessError::NotFitted {
            component: "LatentPipeline",
        })?;
        let scaled = stages.scaler.transform(x)?;
        let latent = stages.encoder.transform(scaled.view())?;
        stages.classifier.predict_score(latent.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::stratified_split;
    use crate::synth::SyntheticGenerator;
    use std::collections::HashSet;

    fn configs() -> (AutoencoderConfig, EstimatorConfig) {
        let autoencoder = AutoencoderConfig {
            hidden_dims: vec![16],
            latent_dim: 8,
            batch_size: 64,
            learning_rate: 5e-3,
            max_epochs: 15,
            patience: 3,
            ..AutoencoderConfig::default()
        };
        (autoencoder, EstimatorConfig::default())
    }

    #[test]
    fn test_autoencoder_and_classifier_rows_are_disjoint() {
        let ds = SyntheticGenerator::new(60).dataset(1_000, 60).unwrap();
        let (ae, est) = configs();
        let mut model = LatentPipeline::new(&ae, &est);
        model.fit(ds.features(), ds.labels()).unwrap();

        let autoencoder: HashSet<_> = model.autoencoder_rows().iter().copied().collect();
        let classifier: HashSet<_> = model.classifier_rows().iter().copied().collect();
        assert!(autoencoder.is_disjoint(&classifier));

        // autoencoder sees normals only; classifier gets every fraud
        assert!(model.autoencoder_rows().iter().all(|&r| ds.labels()[r] == NORMAL));
        let frauds: HashSet<_> = ds.class_indices(FRAUD).into_iter().collect();
        assert!(frauds.is_subset(&classifier));
        assert_eq!(autoencoder.len(), 500);
        assert_eq!(autoencoder.len() + classifier.len(), ds.len());
    }

    #[test]
    fn test_scores_held_out_rows() {
        let ds = SyntheticGenerator::new(61).dataset(1_600, 120).unwrap();
        let split = stratified_split(&ds, 0.25, 2).unwrap();
        let (ae, est) = configs();
        let mut model = LatentPipeline::new(&ae, &est);

        assert!(model.predict_score(split.test.features()).is_err());
        model.fit(split.train.features(), split.train.labels()).unwrap();

        let scores = model.predict_score(split.test.features()).unwrap();
        assert_eq!(scores.len(), split.test.len());
        assert!(!model.history().is_empty());
        assert!(model.stop_reason().is_some());
    }

    #[test]
    fn test_failed_encoder_leaves_pipeline_unfitted() {
        let ds = SyntheticGenerator::new(63).dataset(400, 40).unwrap();
        let (mut ae, est) = configs();
        ae.learning_rate = 0.0;
        let mut model = LatentPipeline::new(&ae, &est);

        // the scaler stage succeeds before the encoder rejects its schedule
        for _ in 0..2 {
            assert!(matches!(
                model.fit(ds.features(), ds.labels()).unwrap_err(),
                HarnessError::Precondition(_)
            ));
        }
        assert!(matches!(
            model.predict_score(ds.features()).unwrap_err(),
            HarnessError::NotFitted { .. }
        ));
        assert!(model.history().is_empty());
        assert!(model.autoencoder_rows().is_empty());
    }

    #[test]
    fn test_second_fit_is_rejected() {
        let ds = SyntheticGenerator::new(64).dataset(600, 40).unwrap();
        let (ae, est) = configs();
        let mut model = LatentPipeline::new(&ae, &est);
        model.fit(ds.features(), ds.labels()).unwrap();
        assert!(matches!(
            model.fit(ds.features(), ds.labels()).unwrap_err(),
            HarnessError::AlreadyFitted { .. }
        ));
    }

    #[test]
    fn test_rejects_degenerate_fraction() {
        let ds = SyntheticGenerator::new(62).dataset(200, 20).unwrap();
        let (mut ae, est) = configs();
        ae.normal_fraction = 1.0;
        let mut model = LatentPipeline::new(&ae, &est);
        assert!(matches!(
            model.fit(ds.features(), ds.labels()).unwrap_err(),
            HarnessError::Precondition(_)
        ));
    }
}
