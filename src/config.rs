//! Configuration management for the evaluation harness

use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Data-preparation strategy applied ahead of the classifier
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Scale, then classify. No resampling.
    #[default]
    Direct,
    /// SMOTE inside each training fold
    Oversample,
    /// Random majority undersampling inside each training fold
    Undersample,
    /// SMOTE followed by Tomek-link cleaning inside each training fold
    Combined,
    /// Classify on autoencoder latent features
    LatentEncoded,
}

impl Strategy {
    /// Whether this strategy resamples inside cross-validation folds
    pub fn is_sampling(&self) -> bool {
        matches!(
            self,
            Strategy::Oversample | Strategy::Undersample | Strategy::Combined
        )
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub autoencoder: AutoencoderConfig,
    #[serde(default = "default_experiments")]
    pub experiments: Vec<ExperimentConfig>,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input dataset location and schema checks
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// CSV file with the transaction table
    #[serde(default = "default_data_path")]
    pub path: String,
    /// Gzip archive extracted to `path` when the CSV is missing
    #[serde(default)]
    pub archive_path: Option<String>,
    /// Feature columns plus the `Class` column
    #[serde(default = "default_expected_columns")]
    pub expected_columns: usize,
    /// Minimum number of rows accepted
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
}

fn default_data_path() -> String {
    "data/creditcard.csv".to_string()
}

fn default_expected_columns() -> usize {
    31
}

fn default_min_rows() -> usize {
    1000
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            archive_path: None,
            expected_columns: default_expected_columns(),
            min_rows: default_min_rows(),
        }
    }
}

/// Train/test split configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for the final evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
        }
    }
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    /// Inverse L2 regularization strength
    #[serde(default = "default_c")]
    pub c: f64,
    /// Newton iteration budget
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Gradient-norm convergence tolerance
    #[serde(default = "default_tol")]
    pub tol: f64,
}

fn default_c() -> f64 {
    1.0
}

fn default_max_iter() -> usize {
    100
}

fn default_tol() -> f64 {
    1e-6
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            c: default_c(),
            max_iter: default_max_iter(),
            tol: default_tol(),
        }
    }
}

/// Cross-validation used by the sampling pipelines
#[derive(Debug, Clone, Deserialize)]
pub struct CrossValidationConfig {
    #[serde(default = "default_folds")]
    pub folds: usize,
    /// Candidate values of C searched per fold
    #[serde(default = "default_c_grid")]
    pub c_grid: Vec<f64>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_folds() -> usize {
    5
}

fn default_c_grid() -> Vec<f64> {
    vec![0.001, 0.01, 0.1, 1.0, 10.0]
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            folds: default_folds(),
            c_grid: default_c_grid(),
            seed: default_seed(),
        }
    }
}

/// Sampler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Same-class neighbours considered when synthesizing minority rows
    #[serde(default = "default_k_neighbors")]
    pub k_neighbors: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_k_neighbors() -> usize {
    5
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            k_neighbors: default_k_neighbors(),
            seed: default_seed(),
        }
    }
}

/// Autoencoder architecture and training schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoencoderConfig {
    /// Encoder hidden widths between input and latent layer
    #[serde(default = "default_hidden_dims")]
    pub hidden_dims: Vec<usize>,
    /// Bottleneck width
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,
    /// Share of training normals reserved for the autoencoder
    #[serde(default = "default_normal_fraction")]
    pub normal_fraction: f64,
    /// Share of autoencoder rows held out for early stopping
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,
    /// Epochs without validation improvement before stopping
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default = "default_min_delta")]
    pub min_delta: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_hidden_dims() -> Vec<usize> {
    vec![24]
}

fn default_latent_dim() -> usize {
    12
}

fn default_normal_fraction() -> f64 {
    0.5
}

fn default_validation_fraction() -> f64 {
    0.2
}

fn default_batch_size() -> usize {
    256
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_max_epochs() -> usize {
    50
}

fn default_patience() -> usize {
    5
}

fn default_min_delta() -> f64 {
    1e-4
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            hidden_dims: default_hidden_dims(),
            latent_dim: default_latent_dim(),
            normal_fraction: default_normal_fraction(),
            validation_fraction: default_validation_fraction(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            max_epochs: default_max_epochs(),
            patience: default_patience(),
            min_delta: default_min_delta(),
            seed: default_seed(),
        }
    }
}

/// One named experiment
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExperimentConfig {
    pub name: String,
    pub strategy: Strategy,
}

impl ExperimentConfig {
    pub fn new(name: &str, strategy: Strategy) -> Self {
        Self {
            name: name.to_string(),
            strategy,
        }
    }
}

fn default_experiments() -> Vec<ExperimentConfig> {
    vec![
        ExperimentConfig::new("baseline", Strategy::Direct),
        ExperimentConfig::new("autoencoder_latent", Strategy::LatentEncoded),
        ExperimentConfig::new("smote", Strategy::Oversample),
        ExperimentConfig::new("undersampling", Strategy::Undersample),
        ExperimentConfig::new("smote_tomek", Strategy::Combined),
    ]
}

/// Report output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// JSON report destination; no file is written when unset
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Whether the configured experiments mix single-split and cross-validated protocols
    pub fn mixes_protocols(&self) -> bool {
        let sampling = self.experiments.iter().filter(|e| e.strategy.is_sampling()).count();
        sampling > 0 && sampling < self.experiments.len()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitConfig::default(),
            estimator: EstimatorConfig::default(),
            cross_validation: CrossValidationConfig::default(),
            sampling: SamplingConfig::default(),
            autoencoder: AutoencoderConfig::default(),
            experiments: default_experiments(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
