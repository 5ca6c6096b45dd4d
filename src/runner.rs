//! Experiment runner: one split, every configured strategy, one results table

use crate::config::{AppConfig, ExperimentConfig};
use crate::error::{HarnessError, Result};
use crate::metrics::evaluate;
use crate::models::Classifier;
use crate::pipeline::{FoldAudit, PreparedPipeline};
use crate::split::{stratified_split, DatasetSplit};
use crate::types::dataset::Dataset;
use crate::types::result::{ExperimentReport, ResultsCollector};
use std::time::Instant;
use tracing::{info, warn};

/// Runs the configured experiments in order against a shared train/test split.
pub struct ExperimentRunner {
    config: AppConfig,
}

impl ExperimentRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Split `dataset` once and evaluate every experiment on the same test rows
    pub fn run(&self, dataset: &Dataset) -> Result<ExperimentReport> {
        if self.config.experiments.is_empty() {
            return Err(HarnessError::precondition("no experiments configured"));
        }
        if self.config.mixes_protocols() {
            warn!(
                folds = self.config.cross_validation.folds,
                "Sampling experiments choose C by cross-validation while the others use a \
                 fixed C on a single split; compare their rows with care"
            );
        }

        let split = stratified_split(dataset, self.config.split.test_fraction, self.config.split.seed)?;

        let mut collector = ResultsCollector::new();
        let mut autoencoder_history = None;
        for experiment in &self.config.experiments {
            let (single, pipeline) = self.run_experiment(experiment, &split)?;
            collector = collector.merge(single);
            if let Some(history) = pipeline.autoencoder_history() {
                autoencoder_history = Some(history.to_vec());
            }
        }

        for line in collector.table() {
            info!("{}", line);
        }

        Ok(ExperimentReport::new(
            self.config.split.seed,
            collector,
            autoencoder_history,
        ))
    }

    /// Fit one strategy on the training split and evaluate it on the test split
    pub fn run_experiment(
        &self,
        experiment: &ExperimentConfig,
        split: &DatasetSplit,
    ) -> Result<(ResultsCollector, PreparedPipeline)> {
        info!(
            experiment = %experiment.name,
            strategy = ?experiment.strategy,
            "Running experiment"
        );
        let start = Instant::now();

        let mut pipeline = PreparedPipeline::build(experiment.strategy, &self.config)?;
        pipeline.fit(split.train.features(), split.train.labels())?;

        check_fold_audits(&experiment.name, pipeline.fold_audits())?;

        let protocol = pipeline.protocol();
        let collector = evaluate(
            ResultsCollector::new(),
            &experiment.name,
            &pipeline,
            &split.test,
            protocol,
        )?;

        info!(
            experiment = %experiment.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Experiment finished"
        );
        Ok((collector, pipeline))
    }
}

/// Fail if any cross-validation round handed validation rows to its sampler
pub fn check_fold_audits(experiment: &str, audits: &[FoldAudit]) -> Result<()> {
    let leaked: usize = audits.iter().map(|audit| audit.leaked_rows().len()).sum();
    if leaked > 0 {
        return Err(HarnessError::precondition(format!(
            "experiment {} resampled {} validation rows",
            experiment, leaked
        )));
    }
    Ok(())
}
