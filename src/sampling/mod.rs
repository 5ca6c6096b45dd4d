//! Class-rebalancing samplers.
//!
//! Samplers only ever receive the rows they are allowed to learn from; every
//! output row records which input rows produced it so callers can audit that
//! no held-out row leaked in.

pub mod neighbors;
pub mod smote;
pub mod tomek;
pub mod undersample;

pub use neighbors::{KdTree, Neighbor};
pub use smote::Smote;
pub use tomek::SmoteTomek;
pub use undersample::RandomUnderSampler;

use crate::config::{SamplingConfig, Strategy};
use crate::error::{HarnessError, Result};
use crate::types::dataset::{check_rows, ClassCounts};
use crate::types::transaction::{FRAUD, NORMAL};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeSet;

/// Where a sampler output row came from, as indices into the sampler input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Copied from an input row
    Original(usize),
    /// Interpolated between an input row and one of its neighbours
    Synthetic { base: usize, neighbor: usize },
}

impl Provenance {
    /// Input rows that contributed to this output row
    pub fn sources(&self) -> impl Iterator<Item = usize> {
        let (first, second) = match *self {
            Provenance::Original(i) => (i, None),
            Provenance::Synthetic { base, neighbor } => (base, Some(neighbor)),
        };
        std::iter::once(first).chain(second)
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Provenance::Synthetic { .. })
    }
}

/// Sampler output
#[derive(Debug, Clone)]
pub struct Resampled {
    pub features: Array2<f64>,
    pub labels: Array1<u8>,
    pub provenance: Vec<Provenance>,
}

impl Resampled {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn class_counts(&self) -> Result<ClassCounts> {
        ClassCounts::from_labels(self.labels.view())
    }

    /// Every input row that contributed to at least one output row
    pub fn source_indices(&self) -> BTreeSet<usize> {
        self.provenance.iter().flat_map(|p| p.sources()).collect()
    }

    /// Keep only the listed output rows, in the given order
    pub(crate) fn retain_rows(self, keep: &[usize]) -> Resampled {
        Resampled {
            features: self.features.select(ndarray::Axis(0), keep),
            labels: self.labels.select(ndarray::Axis(0), keep),
            provenance: keep.iter().map(|&i| self.provenance[i]).collect(),
        }
    }
}

/// A resampling policy applied to training rows only
pub trait Sampler {
    /// Rebalance `x`/`y`, drawing randomness from `rng`
    fn resample(&self, x: ArrayView2<f64>, y: ArrayView1<u8>, rng: &mut ChaCha8Rng) -> Result<Resampled>;

    fn name(&self) -> &'static str;
}

/// Sampler for a strategy, or `None` for strategies that do not resample
pub fn sampler_for(strategy: Strategy, config: &SamplingConfig) -> Option<Box<dyn Sampler>> {
    match strategy {
        Strategy::Oversample => Some(Box::new(Smote::new(config.k_neighbors))),
        Strategy::Undersample => Some(Box::new(RandomUnderSampler::new())),
        Strategy::Combined => Some(Box::new(SmoteTomek::new(config.k_neighbors))),
        Strategy::Direct | Strategy::LatentEncoded => None,
    }
}

/// Minority and majority labels with their counts; both classes must be present
pub(crate) fn class_roles(x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<ClassRoles> {
    check_rows(x, y)?;
    let counts = ClassCounts::from_labels(y)?;
    if counts.normal == 0 || counts.fraud == 0 {
        return Err(HarnessError::precondition(format!(
            "resampling needs both classes (normal={}, fraud={})",
            counts.normal, counts.fraud
        )));
    }

    Ok(if counts.fraud <= counts.normal {
        ClassRoles {
            minority: FRAUD,
            minority_count: counts.fraud,
            majority_count: counts.normal,
        }
    } else {
        ClassRoles {
            minority: NORMAL,
            minority_count: counts.normal,
            majority_count: counts.fraud,
        }
    })
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassRoles {
    pub minority: u8,
    pub minority_count: usize,
    pub majority_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_provenance_sources() {
        assert_eq!(Provenance::Original(3).sources().collect::<Vec<_>>(), vec![3]);
        let synthetic = Provenance::Synthetic { base: 1, neighbor: 7 };
        assert_eq!(synthetic.sources().collect::<Vec<_>>(), vec![1, 7]);
        assert!(synthetic.is_synthetic());
    }

    #[test]
    fn test_sampler_per_strategy() {
        let config = SamplingConfig::default();
        assert_eq!(sampler_for(Strategy::Oversample, &config).unwrap().name(), "smote");
        assert_eq!(
            sampler_for(Strategy::Undersample, &config).unwrap().name(),
            "random_undersample"
        );
        assert_eq!(sampler_for(Strategy::Combined, &config).unwrap().name(), "smote_tomek");
        assert!(sampler_for(Strategy::Direct, &config).is_none());
        assert!(sampler_for(Strategy::LatentEncoded, &config).is_none());
    }

    #[test]
    fn test_class_roles_require_both_classes() {
        let x = array![[1.0], [2.0]];
        assert!(class_roles(x.view(), array![0, 0].view()).is_err());

        let roles = class_roles(x.view(), array![0, 1].view()).unwrap();
        assert_eq!(roles.minority, FRAUD);
    }
}
