//! Seeded synthetic transactions with the reference table's schema.
//!
//! Normal rows draw their components from a standard normal distribution.
//! Fraud rows shift the first half of the components so that classes overlap
//! but remain separable, mimicking the structure of the real table.

use crate::error::Result;
use crate::types::dataset::Dataset;
use crate::types::transaction::{TransactionRecord, FRAUD, NORMAL};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Shift applied to fraud components V1..V14
const FRAUD_SHIFT: f64 = 2.5;

/// Deterministic transaction generator
pub struct SyntheticGenerator {
    rng: ChaCha8Rng,
    clock: f64,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock: 0.0,
        }
    }

    /// Generate a legitimate transaction
    pub fn generate_legitimate(&mut self) -> TransactionRecord {
        self.clock += self.rng.gen_range(0.0..5.0);
        let mut components = [0.0; 28];
        for c in components.iter_mut() {
            *c = self.gaussian();
        }

        let mut tx = TransactionRecord::new(self.clock, self.rng.gen_range(1.0..250.0), NORMAL);
        tx.set_components(&components);
        tx
    }

    /// Generate a fraudulent transaction
    pub fn generate_fraud(&mut self) -> TransactionRecord {
        self.clock += self.rng.gen_range(0.0..5.0);
        let mut components = [0.0; 28];
        for (i, c) in components.iter_mut().enumerate() {
            let shift = if i < 14 { FRAUD_SHIFT } else { 0.0 };
            *c = self.gaussian() * 1.5 - shift;
        }

        let mut tx = TransactionRecord::new(self.clock, self.rng.gen_range(0.0..1000.0), FRAUD);
        tx.set_components(&components);
        tx
    }

    /// Generate `count` records with `round(count * fraud_rate)` frauds, shuffled
    pub fn generate(&mut self, count: usize, fraud_rate: f64) -> Vec<TransactionRecord> {
        let fraud = ((count as f64) * fraud_rate.clamp(0.0, 1.0)).round() as usize;
        let mut labels: Vec<u8> = std::iter::repeat(FRAUD)
            .take(fraud)
            .chain(std::iter::repeat(NORMAL).take(count - fraud))
            .collect();
        labels.shuffle(&mut self.rng);

        labels
            .into_iter()
            .map(|label| {
                if label == FRAUD {
                    self.generate_fraud()
                } else {
                    self.generate_legitimate()
                }
            })
            .collect()
    }

    /// Generate a dataset with exact class counts
    pub fn dataset(&mut self, normal: usize, fraud: usize) -> Result<Dataset> {
        let total = normal + fraud;
        let rate = if total == 0 { 0.0 } else { fraud as f64 / total as f64 };
        let records = self.generate(total, rate);
        Dataset::from_records(&records)
    }

    /// Standard normal draw via Box-Muller
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}
