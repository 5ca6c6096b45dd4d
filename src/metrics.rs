//! Evaluation metrics for the comparison harness.
//!
//! Confusion counts come from the classifier's hard predictions; average
//! precision sweeps its decision function over every distinct threshold.

use crate::error::{HarnessError, Result};
use crate::models::{labels_from_scores, Classifier};
use crate::types::dataset::Dataset;
use crate::types::result::{EvaluationProtocol, ResultRecord, ResultsCollector};
use crate::types::transaction::FRAUD;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Confusion matrix for binary fraud labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    /// Fraud flagged as fraud
    pub tp: usize,
    /// Normal passed as normal
    pub tn: usize,
    /// Normal flagged as fraud
    pub fp: usize,
    /// Fraud passed as normal
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally predictions against ground truth
    pub fn from_predictions(labels: ArrayView1<u8>, predicted: ArrayView1<u8>) -> Result<Self> {
        if labels.len() != predicted.len() {
            return Err(HarnessError::DimensionMismatch {
                context: "predictions vs labels",
                expected: labels.len(),
                actual: predicted.len(),
            });
        }

        let mut counts = Self::new();
        for (&actual, &guess) in labels.iter().zip(predicted.iter()) {
            counts.record(actual == FRAUD, guess == FRAUD);
        }
        Ok(counts)
    }

    /// Record a single prediction
    pub fn record(&mut self, actual_fraud: bool, predicted_fraud: bool) {
        match (actual_fraud, predicted_fraud) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Number of fraud rows evaluated
    pub fn actual_positive(&self) -> usize {
        self.tp + self.fn_
    }

    /// Number of normal rows evaluated
    pub fn actual_negative(&self) -> usize {
        self.tn + self.fp
    }

    /// TP / (TP + FN) as a percentage
    pub fn true_positive_rate(&self) -> f64 {
        if self.actual_positive() == 0 {
            0.0
        } else {
            100.0 * self.tp as f64 / self.actual_positive() as f64
        }
    }
}

/// A single point on the precision-recall curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrPoint {
    /// Rows scoring at or above this value are flagged
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Precision and recall at every distinct score, highest threshold first.
///
/// Tied scores enter the curve together. Fails when the inputs are empty,
/// differ in length, or contain no fraud rows.
pub fn precision_recall_curve(scores: ArrayView1<f64>, labels: ArrayView1<u8>) -> Result<Vec<PrPoint>> {
    if scores.is_empty() {
        return Err(HarnessError::precondition("empty score vector"));
    }
    if scores.len() != labels.len() {
        return Err(HarnessError::DimensionMismatch {
            context: "scores vs labels",
            expected: labels.len(),
            actual: scores.len(),
        });
    }
    if let Some(row) = scores.iter().position(|s| s.is_nan()) {
        return Err(HarnessError::Numerical(format!("score for row {} is NaN", row)));
    }

    let positives = labels.iter().filter(|&&l| l == FRAUD).count();
    if positives == 0 {
        return Err(HarnessError::precondition(
            "precision-recall curve needs at least one fraud row",
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = Vec::new();
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] == FRAUD {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(PrPoint {
            threshold,
            precision: tp as f64 / (tp + fp) as f64,
            recall: tp as f64 / positives as f64,
        });
    }

    Ok(points)
}

/// Step-wise area under the precision-recall curve: `sum((R_i - R_{i-1}) * P_i)`
pub fn average_precision(scores: ArrayView1<f64>, labels: ArrayView1<u8>) -> Result<f64> {
    let curve = precision_recall_curve(scores, labels)?;
    let mut previous_recall = 0.0;
    let mut area = 0.0;
    for point in &curve {
        area += (point.recall - previous_recall) * point.precision;
        previous_recall = point.recall;
    }
    Ok(area)
}

/// Score `model` on the held-out set and return `collector` with one more record.
///
/// Earlier records are moved through untouched.
pub fn evaluate(
    collector: ResultsCollector,
    name: &str,
    model: &dyn Classifier,
    test: &Dataset,
    protocol: EvaluationProtocol,
) -> Result<ResultsCollector> {
    let scores = model.predict_score(test.features())?;
    let predicted = labels_from_scores(scores.view());

    let counts = ConfusionCounts::from_predictions(test.labels(), predicted.view())?;
    let ap = average_precision(scores.view(), test.labels())?;

    let record = ResultRecord::new(name, counts, ap, protocol);
    info!(
        experiment = name,
        tp = counts.tp,
        fraud = counts.actual_positive(),
        fp = counts.fp,
        tp_rate = format!("{:.2}%", record.true_positive_rate),
        average_precision = format!("{:.4}", ap),
        protocol = %protocol,
        "Experiment evaluated"
    );

    Ok(collector.with_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, ArrayView2};

    /// Scores the first feature column directly
    struct ColumnScorer;

    impl Classifier for ColumnScorer {
        fn fit(&mut self, _x: ArrayView2<f64>, _y: ArrayView1<u8>) -> Result<()> {
            Ok(())
        }

        fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
            Ok(x.column(0).to_owned())
        }
    }

    /// Counts decision-function calls
    struct CountingScorer {
        calls: std::cell::Cell<usize>,
    }

    impl Classifier for CountingScorer {
        fn fit(&mut self, _x: ArrayView2<f64>, _y: ArrayView1<u8>) -> Result<()> {
            Ok(())
        }

        fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
            self.calls.set(self.calls.get() + 1);
            Ok(x.column(0).to_owned())
        }
    }

    #[test]
    fn test_evaluate_scores_once() {
        let test = Dataset::new(array![[1.5], [-0.5], [0.3], [-2.0]], array![1, 1, 0, 0]).unwrap();
        let model = CountingScorer {
            calls: std::cell::Cell::new(0),
        };

        let collector = evaluate(
            ResultsCollector::new(),
            "counted",
            &model,
            &test,
            EvaluationProtocol::SingleSplit,
        )
        .unwrap();

        assert_eq!(model.calls.get(), 1);
        let counts = collector.records()[0].counts;
        assert_eq!(counts, ConfusionCounts { tp: 1, tn: 1, fp: 1, fn_: 1 });
    }

    #[test]
    fn test_confusion_counts() {
        let labels = array![1, 1, 0, 0, 0];
        let predicted = array![1, 0, 1, 0, 0];
        let cm = ConfusionCounts::from_predictions(labels.view(), predicted.view()).unwrap();

        assert_eq!(cm, ConfusionCounts { tp: 1, tn: 2, fp: 1, fn_: 1 });
        assert_eq!(cm.total(), 5);
        assert!((cm.true_positive_rate() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_average_precision_hand_computed() {
        // P/R after each threshold: (1, .5), (.5, .5), (2/3, 1), (.5, 1)
        let scores = array![0.9, 0.8, 0.7, 0.6];
        let labels = array![1, 0, 1, 0];
        let ap = average_precision(scores.view(), labels.view()).unwrap();
        assert!((ap - (0.5 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_average_precision_perfect_and_ties() {
        let ap = average_precision(array![3.0, 2.0, 1.0].view(), array![1, 1, 0].view()).unwrap();
        assert!((ap - 1.0).abs() < 1e-12);

        // one tied threshold for all rows
        let ap = average_precision(array![0.5, 0.5].view(), array![1, 0].view()).unwrap();
        assert!((ap - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_curve_requires_fraud() {
        let err = precision_recall_curve(array![0.1, 0.2].view(), array![0, 0].view()).unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[test]
    fn test_evaluate_appends_record_with_consistent_counts() {
        let test = Dataset::new(
            array![[2.0], [-1.0], [0.5], [-3.0], [1.0], [-0.2]],
            array![1, 1, 0, 0, 0, 0],
        )
        .unwrap();

        let first = evaluate(
            ResultsCollector::new(),
            "first",
            &ColumnScorer,
            &test,
            EvaluationProtocol::SingleSplit,
        )
        .unwrap();
        let snapshot = first.records()[0].clone();

        let both = evaluate(
            first,
            "second",
            &ColumnScorer,
            &test,
            EvaluationProtocol::CrossValidated { folds: 3 },
        )
        .unwrap();

        assert_eq!(both.len(), 2);
        assert_eq!(both.records()[0], snapshot);
        for record in both.records() {
            let counts = test.class_counts();
            assert_eq!(record.counts.tp + record.counts.fn_, counts.fraud);
            assert_eq!(record.counts.tn + record.counts.fp, counts.normal);
        }
        assert_eq!(both.records()[1].counts.tp, 1);
        assert_eq!(both.records()[1].counts.fp, 2);
    }
}
