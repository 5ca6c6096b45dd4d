//! Synthetic Dataset Writer
//!
//! Writes a seeded CSV with the transaction table's header so the harness can
//! be exercised without the real data.

use anyhow::{Context, Result};
use fraud_eval_harness::synth::SyntheticGenerator;
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synth_dataset=info".parse()?),
        )
        .init();

    info!("Starting Synthetic Dataset Writer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("data/creditcard.csv");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20_000);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.0017);
    let seed: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(42);

    info!(
        output = %output,
        count = count,
        fraud_rate = fraud_rate,
        seed = seed,
        "Configuration loaded"
    );

    if let Some(parent) = std::path::Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(output).with_context(|| format!("Failed to create {}", output))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let mut generator = SyntheticGenerator::new(seed);
    let mut fraud = 0;

    for (i, record) in generator.generate(count, fraud_rate).into_iter().enumerate() {
        if record.is_fraud() {
            fraud += 1;
        }
        writer.serialize(&record)?;

        if (i + 1) % 10_000 == 0 {
            info!("Wrote {}/{} rows ({} fraud)", i + 1, count, fraud);
        }
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} rows ({} legitimate, {} fraud) to {}",
        count,
        count - fraud,
        fraud,
        output
    );

    Ok(())
}
