//! Fraud Evaluation Harness - Main Entry Point
//!
//! Loads the transaction table, runs every configured data-preparation
//! strategy against one stratified split and prints the comparison table.

use anyhow::{Context, Result};
use fraud_eval_harness::{
    config::{AppConfig, LoggingConfig},
    loader::load_dataset,
    runner::ExperimentRunner,
};
use std::time::Instant;
use tracing::info;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fraud_eval_harness={}", logging.level).parse()?);

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load configuration
    let (config, config_path) = match std::env::args().nth(1) {
        Some(path) => (AppConfig::load_from_path(&path)?, path),
        None => (AppConfig::load()?, "config/config.toml".to_string()),
    };

    init_logging(&config.logging)?;

    info!("Starting Fraud Evaluation Harness");
    info!(path = %config_path, "Configuration loaded successfully");
    info!(
        "Split: test_fraction={:.2}, seed={}; CV: {} folds over C={:?}",
        config.split.test_fraction,
        config.split.seed,
        config.cross_validation.folds,
        config.cross_validation.c_grid
    );

    let start = Instant::now();
    let dataset = load_dataset(&config.data)
        .with_context(|| format!("Failed to load dataset from {}", config.data.path))?;
    let counts = dataset.class_counts();
    info!(
        rows = dataset.len(),
        normal = counts.normal,
        fraud = counts.fraud,
        fraud_ratio = format!("{:.4}%", 100.0 * counts.fraud_ratio()),
        "Dataset loaded"
    );

    let output_path = config.report.output_path.clone();
    let runner = ExperimentRunner::new(config);
    let report = runner.run(&dataset).context("Experiment run failed")?;

    println!();
    for line in report.records.table() {
        println!("{}", line);
    }
    println!();

    if let Some(path) = output_path {
        report
            .write_json(&path)
            .with_context(|| format!("Failed to write report to {}", path))?;
        info!(path = %path, run_id = %report.run_id, "Report written");
    }

    info!(
        elapsed_s = format!("{:.1}", start.elapsed().as_secs_f64()),
        experiments = report.records.len(),
        "Harness finished"
    );

    Ok(())
}
