//! SMOTE followed by Tomek-link cleaning

use super::neighbors::KdTree;
use super::smote::Smote;
use super::{Resampled, Sampler};
use crate::error::Result;
use ndarray::{ArrayView1, ArrayView2};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Oversample with SMOTE, then drop both rows of every Tomek link.
#[derive(Debug, Clone)]
pub struct SmoteTomek {
    smote: Smote,
}

impl SmoteTomek {
    pub fn new(k_neighbors: usize) -> Self {
        Self {
            smote: Smote::new(k_neighbors),
        }
    }
}

impl Sampler for SmoteTomek {
    fn resample(&self, x: ArrayView2<f64>, y: ArrayView1<u8>, rng: &mut ChaCha8Rng) -> Result<Resampled> {
        let oversampled = self.smote.resample(x, y, rng)?;
        let linked = tomek_links(oversampled.features.view(), oversampled.labels.view())?;

        let keep: Vec<usize> = (0..oversampled.len()).filter(|&i| !linked[i]).collect();
        let removed = oversampled.len() - keep.len();
        debug!(
            oversampled = oversampled.len(),
            removed,
            "Tomek links cleaned"
        );

        Ok(oversampled.retain_rows(&keep))
    }

    fn name(&self) -> &'static str {
        "smote_tomek"
    }
}

/// Mark rows that belong to a Tomek link: a pair of rows with different
/// labels that are each other's nearest neighbour.
pub fn tomek_links(x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<Vec<bool>> {
    let n = x.nrows();
    let mut linked = vec![false; n];
    if n < 2 {
        return Ok(linked);
    }

    let tree = KdTree::build(x)?;
    let mut nearest = Vec::with_capacity(n);
    for i in 0..n {
        let found = tree.nearest(x.row(i), 1, Some(i))?;
        nearest.push(found[0].index);
    }

    for (i, &j) in nearest.iter().enumerate() {
        if y[i] != y[j] && nearest[j] == i {
            linked[i] = true;
            linked[j] = true;
        }
    }
    Ok(linked)
}
