//! Random majority undersampling

use super::{class_roles, Provenance, Resampled, Sampler};
use crate::error::Result;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Drops majority rows at random until both classes have the minority count.
///
/// Kept rows stay in their input order.
#[derive(Debug, Clone, Default)]
pub struct RandomUnderSampler;

impl RandomUnderSampler {
    pub fn new() -> Self {
        Self
    }
}

impl Sampler for RandomUnderSampler {
    fn resample(&self, x: ArrayView2<f64>, y: ArrayView1<u8>, rng: &mut ChaCha8Rng) -> Result<Resampled> {
        let roles = class_roles(x, y)?;

        let majority_rows: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label != roles.minority)
            .map(|(i, _)| i)
            .collect();
        let chosen = index::sample(rng, majority_rows.len(), roles.minority_count);

        let mut keep: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == roles.minority)
            .map(|(i, _)| i)
            .chain(chosen.iter().map(|i| majority_rows[i]))
            .collect();
        keep.sort_unstable();

        debug!(
            kept_majority = roles.minority_count,
            dropped = roles.majority_count - roles.minority_count,
            "Random undersampling"
        );

        Ok(Resampled {
            features: x.select(Axis(0), &keep),
            labels: y.select(Axis(0), &keep),
            provenance: keep.into_iter().map(Provenance::Original).collect(),
        })
    }

    fn name(&self) -> &'static str {
        "random_undersample"
    }
}
