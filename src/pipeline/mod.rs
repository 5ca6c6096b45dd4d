//! Prepared estimators, one per data-preparation strategy.
//!
//! Every strategy accepts raw feature rows and owns whatever scaling,
//! resampling or encoding it needs, so callers only ever see a
//! [`Classifier`].

pub mod latent;
pub mod sampling;

pub use latent::LatentPipeline;
pub use sampling::{FoldAudit, SamplingPipeline};

use crate::autoencoder::EpochLoss;
use crate::config::{AppConfig, Strategy};
use crate::error::{HarnessError, Result};
use crate::models::{Classifier, LogisticRegression, LogisticRegressionCv};
use crate::sampling::sampler_for;
use crate::split::StratifiedKFold;
use crate::transform::{StandardScaler, Transformer};
use crate::types::result::EvaluationProtocol;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Scale, then logistic regression with a fixed C
pub struct DirectPipeline {
    scaler: StandardScaler,
    classifier: LogisticRegression,
}

impl DirectPipeline {
    pub fn new(classifier: LogisticRegression) -> Self {
        Self {
            scaler: StandardScaler::new(),
            classifier,
        }
    }
}

impl Classifier for DirectPipeline {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        let scaled = self.scaler.fit_transform(x)?;
        self.classifier.fit(scaled.view(), y)
    }

    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(x)?;
        self.classifier.predict_score(scaled.view())
    }
}

/// A strategy's estimator, selected from configuration
pub enum PreparedPipeline {
    Direct(DirectPipeline),
    Oversample(SamplingPipeline),
    Undersample(SamplingPipeline),
    Combined(SamplingPipeline),
    LatentEncoded(LatentPipeline),
}

impl PreparedPipeline {
    /// Fresh, unfitted estimator for `strategy`
    pub fn build(strategy: Strategy, config: &AppConfig) -> Result<Self> {
        let est = &config.estimator;
        Ok(match strategy {
            Strategy::Direct => PreparedPipeline::Direct(DirectPipeline::new(
                LogisticRegression::new(est.c, est.max_iter, est.tol),
            )),
            Strategy::LatentEncoded => {
                PreparedPipeline::LatentEncoded(LatentPipeline::new(&config.autoencoder, est))
            }
            Strategy::Oversample => PreparedPipeline::Oversample(Self::sampling(strategy, config)?),
            Strategy::Undersample => PreparedPipeline::Undersample(Self::sampling(strategy, config)?),
            Strategy::Combined => PreparedPipeline::Combined(Self::sampling(strategy, config)?),
        })
    }

    /// Sampler, per-fold scaler and cross-validated estimator for a resampling strategy
    fn sampling(strategy: Strategy, config: &AppConfig) -> Result<SamplingPipeline> {
        let sampler = sampler_for(strategy, &config.sampling).ok_or_else(|| {
            HarnessError::precondition(format!("strategy {:?} has no sampler", strategy))
        })?;
        let cv = &config.cross_validation;
        let estimator = LogisticRegressionCv::new(
            cv.c_grid.clone(),
            StratifiedKFold::new(cv.folds, cv.seed),
            config.estimator.max_iter,
            config.estimator.tol,
        );
        Ok(SamplingPipeline::new(sampler, estimator, config.sampling.seed))
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            PreparedPipeline::Direct(_) => Strategy::Direct,
            PreparedPipeline::Oversample(_) => Strategy::Oversample,
            PreparedPipeline::Undersample(_) => Strategy::Undersample,
            PreparedPipeline::Combined(_) => Strategy::Combined,
            PreparedPipeline::LatentEncoded(_) => Strategy::LatentEncoded,
        }
    }

    /// How the estimator's hyperparameters are chosen
    pub fn protocol(&self) -> EvaluationProtocol {
        match self {
            PreparedPipeline::Oversample(p)
            | PreparedPipeline::Undersample(p)
            | PreparedPipeline::Combined(p) => EvaluationProtocol::CrossValidated { folds: p.folds() },
            PreparedPipeline::Direct(_) | PreparedPipeline::LatentEncoded(_) => {
                EvaluationProtocol::SingleSplit
            }
        }
    }

    /// Per-fold sampler audits; empty for strategies without resampling
    pub fn fold_audits(&self) -> &[FoldAudit] {
        match self {
            PreparedPipeline::Oversample(p)
            | PreparedPipeline::Undersample(p)
            | PreparedPipeline::Combined(p) => p.fold_audits(),
            _ => &[],
        }
    }

    /// Autoencoder loss curve for the latent strategy
    pub fn autoencoder_history(&self) -> Option<&[EpochLoss]> {
        match self {
            PreparedPipeline::LatentEncoded(p) => Some(p.history()),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            PreparedPipeline::Direct(p) => p,
            PreparedPipeline::Oversample(p)
            | PreparedPipeline::Undersample(p)
            | PreparedPipeline::Combined(p) => p,
            PreparedPipeline::LatentEncoded(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            PreparedPipeline::Direct(p) => p,
            PreparedPipeline::Oversample(p)
            | PreparedPipeline::Undersample(p)
            | PreparedPipeline::Combined(p) => p,
            PreparedPipeline::LatentEncoded(p) => p,
        }
    }
}

impl Classifier for PreparedPipeline {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.inner().predict_score(x)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>> {
        self.inner().predict(x)
    }
}
