//! Autoencoder latent feature extraction.
//!
//! The lifecycle is encoded in the types: an [`AutoencoderSpec`] describes an
//! unbuilt network, [`AutoencoderSpec::train`] runs reconstruction training
//! and returns a [`TrainedAutoencoder`], and
//! [`TrainedAutoencoder::freeze_encoder`] keeps only the layers up to the
//! bottleneck as a [`FrozenEncoder`], which has no mutating API.

pub mod adam;
pub mod network;

use crate::config::AutoencoderConfig;
use crate::error::{HarnessError, Result};
use crate::transform::Transformer;
use adam::Adam;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use network::{forward_through, Activation, DenseLayer, Network};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Reconstruction losses after one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochLoss {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: f64,
}

/// Why training ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Validation loss stopped improving for `patience` epochs
    EarlyStopped { epoch: usize },
    /// The epoch budget ran out first
    MaxEpochs,
}

/// Patience counter over a monitored loss
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    epochs_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best: f64::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    /// Record an epoch's loss; true if it beats the best by more than `min_delta`
    pub fn observe(&mut self, loss: f64) -> bool {
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.epochs_without_improvement >= self.patience
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Unbuilt autoencoder: architecture and schedule only.
///
/// The network mirrors the encoder widths:
/// `input -> hidden.. -> latent -> ..hidden -> input`, tanh everywhere
/// except the linear output layer.
#[derive(Debug, Clone)]
pub struct AutoencoderSpec {
    input_dim: usize,
    config: AutoencoderConfig,
}

impl AutoencoderSpec {
    pub fn new(input_dim: usize, config: &AutoencoderConfig) -> Result<Self> {
        if input_dim == 0 || config.latent_dim == 0 {
            return Err(HarnessError::precondition(format!(
                "autoencoder widths must be positive (input={}, latent={})",
                input_dim, config.latent_dim
            )));
        }
        if config.batch_size == 0 || config.max_epochs == 0 {
            return Err(HarnessError::precondition(
                "autoencoder needs a positive batch size and epoch budget",
            ));
        }
        if !(config.learning_rate > 0.0) {
            return Err(HarnessError::precondition(format!(
                "learning rate must be positive, got {}",
                config.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&config.validation_fraction) {
            return Err(HarnessError::precondition(format!(
                "validation fraction must be in [0, 1), got {}",
                config.validation_fraction
            )));
        }

        Ok(Self {
            input_dim,
            config: config.clone(),
        })
    }

    /// Layer widths from input to reconstruction
    pub fn layer_dims(&self) -> Vec<usize> {
        let mut dims = vec![self.input_dim];
        dims.extend(self.config.hidden_dims.iter().copied());
        dims.push(self.config.latent_dim);
        dims.extend(self.config.hidden_dims.iter().rev().copied());
        dims.push(self.input_dim);
        dims
    }

    /// Number of layers from the input up to and including the bottleneck
    fn encoder_depth(&self) -> usize {
        self.config.hidden_dims.len() + 1
    }

    /// Train on reconstruction of `x`, holding out a validation share for early stopping.
    pub fn train(self, x: ArrayView2<f64>) -> Result<TrainedAutoencoder> {
        if x.ncols() != self.input_dim {
            return Err(HarnessError::DimensionMismatch {
                context: "autoencoder input",
                expected: self.input_dim,
                actual: x.ncols(),
            });
        }
        if x.nrows() < 2 {
            return Err(HarnessError::precondition(format!(
                "autoencoder needs at least 2 rows, got {}",
                x.nrows()
            )));
        }

        let cfg = &self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let dims = self.layer_dims();
        let mut activations = vec![Activation::Tanh; dims.len() - 1];
        if let Some(last) = activations.last_mut() {
            *last = Activation::Linear;
        }
        let mut network = Network::new(&dims, &activations, &mut rng)?;

        let mut rows: Vec<usize> = (0..x.nrows()).collect();
        rows.shuffle(&mut rng);
        let n_val = ((cfg.validation_fraction * x.nrows() as f64).round() as usize).min(x.nrows() - 1);
        let validation = x.select(Axis(0), &rows[..n_val]);
        let train = x.select(Axis(0), &rows[n_val..]);

        info!(
            train_rows = train.nrows(),
            validation_rows = validation.nrows(),
            dims = ?dims,
            "Training autoencoder"
        );

        let mut adam = Adam::new(cfg.learning_rate);
        let mut stopper = EarlyStopping::new(cfg.patience, cfg.min_delta);
        let mut best_network = network.clone();
        let mut best_epoch = 0;
        let mut history = Vec::with_capacity(cfg.max_epochs);
        let mut stop_reason = StopReason::MaxEpochs;
        let mut order: Vec<usize> = (0..train.nrows()).collect();

        for epoch in 1..=cfg.max_epochs {
            order.shuffle(&mut rng);
            let mut weighted_loss = 0.0;
            for batch_rows in order.chunks(cfg.batch_size) {
                let batch = train.select(Axis(0), batch_rows);
                let (loss, gradients) = network.reconstruction_gradients(batch.view())?;
                if !loss.is_finite() {
                    return Err(HarnessError::Numerical(format!(
                        "reconstruction loss diverged in epoch {}",
                        epoch
                    )));
                }
                adam.step(network.layers_mut(), &gradients);
                weighted_loss += loss * batch_rows.len() as f64;
            }

            let train_loss = weighted_loss / train.nrows() as f64;
            let validation_loss = if n_val > 0 {
                network.reconstruction_loss(validation.view())?
            } else {
                train_loss
            };
            history.push(EpochLoss {
                epoch,
                train_loss,
                validation_loss,
            });
            debug!(epoch, train_loss, validation_loss, "Autoencoder epoch");

            if stopper.observe(validation_loss) {
                best_network = network.clone();
                best_epoch = epoch;
            }
            if stopper.should_stop() {
                stop_reason = StopReason::EarlyStopped { epoch };
                break;
            }
        }

        match stop_reason {
            StopReason::EarlyStopped { epoch } => info!(
                epoch,
                best_epoch,
                best_validation_loss = stopper.best(),
                "Autoencoder stopped early"
            ),
            StopReason::MaxEpochs => warn!(
                max_epochs = cfg.max_epochs,
                best_epoch,
                best_validation_loss = stopper.best(),
                "Autoencoder reached its epoch budget before validation loss plateaued"
            ),
        }

        let encoder_depth = self.encoder_depth();
        Ok(TrainedAutoencoder {
            network: best_network,
            encoder_depth,
            history,
            stop_reason,
            best_epoch,
        })
    }
}

/// Autoencoder after training, holding the best validation weights.
#[derive(Debug, Clone)]
pub struct TrainedAutoencoder {
    network: Network,
    encoder_depth: usize,
    history: Vec<EpochLoss>,
    stop_reason: StopReason,
    best_epoch: usize,
}

impl TrainedAutoencoder {
    pub fn history(&self) -> &[EpochLoss] {
        &self.history
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    /// Epoch whose weights were kept
    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn reconstruct(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.network.forward(x)
    }

    /// Mean squared reconstruction error per row
    pub fn reconstruction_errors(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let out = self.reconstruct(x)?;
        let diff = &out - &x;
        Ok(diff.mapv(|d| d * d).mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(x.nrows())))
    }

    /// Keep the layers up to the bottleneck and drop the decoder
    pub fn freeze_encoder(self) -> FrozenEncoder {
        FrozenEncoder {
            layers: self.network.into_prefix(self.encoder_depth),
        }
    }
}

/// Input-to-bottleneck layers, read-only
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenEncoder {
    layers: Vec<DenseLayer>,
}

impl FrozenEncoder {
    pub fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::inputs).unwrap_or(0)
    }

    pub fn latent_dim(&self) -> usize {
        self.layers.last().map(DenseLayer::outputs).unwrap_or(0)
    }

    /// Latent representation of each row
    pub fn encode(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.input_dim() {
            return Err(HarnessError::DimensionMismatch {
                context: "encoder input",
                expected: self.input_dim(),
                actual: x.ncols(),
            });
        }
        Ok(forward_through(&self.layers, x))
    }
}

/// Transformer that trains an autoencoder on `fit` and encodes on `transform`
#[derive(Debug, Clone)]
pub struct LatentEncoder {
    config: AutoencoderConfig,
    encoder: Option<FrozenEncoder>,
    history: Vec<EpochLoss>,
    stop_reason: Option<StopReason>,
}

impl LatentEncoder {
    pub fn new(config: AutoencoderConfig) -> Self {
        Self {
            config,
            encoder: None,
            history: Vec::new(),
            stop_reason: None,
        }
    }

    /// Loss history of the training run, empty before `fit`
    pub fn history(&self) -> &[EpochLoss] {
        &self.history
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn encoder(&self) -> Result<&FrozenEncoder> {
        self.encoder.as_ref().ok_or(HarnessError::NotFitted {
            component: "LatentEncoder",
        })
    }
}

impl Transformer for LatentEncoder {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        if self.encoder.is_some() {
            return Err(HarnessError::AlreadyFitted {
                component: "LatentEncoder",
            });
        }

        let trained = AutoencoderSpec::new(x.ncols(), &self.config)?.train(x)?;
        self.history = trained.history().to_vec();
        self.stop_reason = Some(trained.stop_reason());
        self.encoder = Some(trained.freeze_encoder());
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.encoder()?.encode(x)
    }

    fn is_fitted(&self) -> bool {
        self.encoder.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SyntheticGenerator;
    use crate::transform::StandardScaler;
    use crate::types::transaction::{FRAUD, NORMAL};

    fn small_config() -> AutoencoderConfig {
        AutoencoderConfig {
            hidden_dims: vec![16],
            latent_dim: 6,
            batch_size: 64,
            learning_rate: 5e-3,
            max_epochs: 30,
            patience: 3,
            ..AutoencoderConfig::default()
        }
    }

    fn scaled_normals(count: usize) -> Array2<f64> {
        let ds = SyntheticGenerator::new(31).dataset(count, 0).unwrap();
        StandardScaler::new().fit_transform(ds.features()).unwrap()
    }

    #[test]
    fn test_early_stopping_counter() {
        let mut stopper = EarlyStopping::new(2, 0.01);
        assert!(stopper.observe(1.0));
        assert!(stopper.observe(0.5));
        assert!(!stopper.observe(0.495));
        assert!(!stopper.should_stop());
        assert!(!stopper.observe(0.6));
        assert!(stopper.should_stop());
        assert_eq!(stopper.best(), 0.5);
    }

    #[test]
    fn test_layer_dims_are_symmetric() {
        let spec = AutoencoderSpec::new(30, &AutoencoderConfig::default()).unwrap();
        assert_eq!(spec.layer_dims(), vec![30, 24, 12, 24, 30]);
        assert_eq!(spec.encoder_depth(), 2);
    }

    #[test]
    fn test_training_reduces_loss_and_restores_best() {
        let x = scaled_normals(600);
        let trained = AutoencoderSpec::new(30, &small_config()).unwrap().train(x.view()).unwrap();

        let history = trained.history();
        assert!(!history.is_empty());
        assert!(history.last().unwrap().train_loss < history[0].train_loss);

        // no epoch beat the kept weights by more than min_delta
        let kept = history[trained.best_epoch() - 1].validation_loss;
        assert!(history.iter().all(|e| e.validation_loss >= kept - 1e-4));
        if let StopReason::EarlyStopped { epoch } = trained.stop_reason() {
            assert_eq!(epoch, history.len());
            assert!(epoch - trained.best_epoch() >= 3);
        }
    }

    #[test]
    fn test_patience_stops_training() {
        let x = scaled_normals(200);
        let config = AutoencoderConfig {
            max_epochs: 500,
            patience: 1,
            min_delta: 10.0,
            ..small_config()
        };
        let trained = AutoencoderSpec::new(30, &config).unwrap().train(x.view()).unwrap();
        // nothing beats the first epoch by 10.0, so the second epoch stops
        assert_eq!(trained.stop_reason(), StopReason::EarlyStopped { epoch: 2 });
        assert_eq!(trained.best_epoch(), 1);
    }

    #[test]
    fn test_frozen_encoder_is_deterministic() {
        let x = scaled_normals(300);
        let a = AutoencoderSpec::new(30, &small_config()).unwrap().train(x.view()).unwrap();
        let b = AutoencoderSpec::new(30, &small_config()).unwrap().train(x.view()).unwrap();
        assert_eq!(a.history(), b.history());

        let encoder = a.freeze_encoder();
        assert_eq!(encoder.latent_dim(), 6);
        let first = encoder.encode(x.view()).unwrap();
        let second = encoder.encode(x.view()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.dim(), (300, 6));
        assert!(first.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_frauds_reconstruct_worse_than_normals() {
        let mut generator = SyntheticGenerator::new(40);
        let ds = generator.dataset(1_000, 100).unwrap();
        let normal_rows = ds.class_indices(NORMAL);
        let fraud_rows = ds.class_indices(FRAUD);

        let mut scaler = StandardScaler::new();
        scaler.fit(ds.select(&normal_rows).features()).unwrap();
        let normals = scaler.transform(ds.select(&normal_rows).features()).unwrap();
        let frauds = scaler.transform(ds.select(&fraud_rows).features()).unwrap();

        let trained = AutoencoderSpec::new(30, &small_config())
            .unwrap()
            .train(normals.view())
            .unwrap();
        let normal_err = trained.reconstruction_errors(normals.view()).unwrap().mean().unwrap();
        let fraud_err = trained.reconstruction_errors(frauds.view()).unwrap().mean().unwrap();
        assert!(fraud_err > normal_err);
    }

    #[test]
    fn test_latent_encoder_lifecycle() {
        let x = scaled_normals(200);
        let mut encoder = LatentEncoder::new(AutoencoderConfig {
            max_epochs: 3,
            ..small_config()
        });
        assert!(matches!(
            encoder.transform(x.view()).unwrap_err(),
            HarnessError::NotFitted { .. }
        ));

        let latent = encoder.fit_transform(x.view()).unwrap();
        assert_eq!(latent.ncols(), 6);
        assert_eq!(encoder.history().len(), 3);
        assert_eq!(encoder.stop_reason(), Some(StopReason::MaxEpochs));
        assert!(matches!(
            encoder.fit(x.view()).unwrap_err(),
            HarnessError::AlreadyFitted { .. }
        ));
    }
}
