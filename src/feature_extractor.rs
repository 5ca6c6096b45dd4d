//! Feature extraction from transaction records.
//!
//! The harness feeds models the raw columns of the reference table in header
//! order: `Time`, `V1`..`V28`, `Amount`. No engineered features are added so
//! that every strategy sees the same inputs.

use crate::types::transaction::TransactionRecord;

/// Number of feature columns produced per record.
pub const FEATURE_COUNT: usize = 30;

/// Transforms transaction records into model input vectors.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a record.
    pub fn extract(&self, tx: &TransactionRecord) -> Vec<f64> {
        let mut features = Vec::with_capacity(FEATURE_COUNT);
        features.push(tx.time);
        features.extend_from_slice(&tx.components());
        features.push(tx.amount);
        features
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in extraction order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(FEATURE_COUNT);
        names.push("Time".to_string());
        names.extend((1..=28).map(|i| format!("V{}", i)));
        names.push("Amount".to_string());
        names
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::NORMAL;

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        let mut tx = TransactionRecord::new(406.0, 0.0, NORMAL);
        tx.v1 = -2.31;
        tx.v28 = 0.12;
        tx.amount = 239.93;

        let features = extractor.extract(&tx);

        assert_eq!(features.len(), extractor.feature_count());
        assert_eq!(features[0], 406.0);
        assert_eq!(features[1], -2.31);
        assert_eq!(features[28], 0.12);
        assert_eq!(features[29], 239.93);
    }

    #[test]
    fn test_feature_names() {
        let extractor = FeatureExtractor::new();
        let names = extractor.feature_names();
        assert_eq!(names.len(), 30);
        assert_eq!(names[0], "Time");
        assert_eq!(names[1], "V1");
        assert_eq!(names[29], "Amount");
    }
}
