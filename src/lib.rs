//! Fraud Evaluation Harness Library
//!
//! Compares data-preparation strategies ahead of a logistic-regression fraud
//! classifier on the anonymized credit card transaction table. Every
//! strategy learns its scaling, resampling and encoding from training rows
//! only and is scored on the same held-out test rows.

pub mod autoencoder;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod sampling;
pub mod split;
pub mod synth;
pub mod transform;
pub mod types;

pub use config::{AppConfig, Strategy};
pub use error::{HarnessError, Result};
pub use feature_extractor::FeatureExtractor;
pub use models::Classifier;
pub use pipeline::PreparedPipeline;
pub use runner::ExperimentRunner;
pub use types::{
    dataset::Dataset,
    result::{ExperimentReport, ResultRecord, ResultsCollector},
    transaction::TransactionRecord,
};
