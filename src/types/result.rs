//! Result records, the append-only collector, and the serialized run report

use crate::autoencoder::EpochLoss;
use crate::error::Result;
use crate::metrics::ConfusionCounts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use uuid::Uuid;

/// How an experiment's model was selected before the final test evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationProtocol {
    /// Fixed hyperparameters, fit once on the training split
    SingleSplit,
    /// Hyperparameters chosen by k-fold cross-validation inside the training split
    CrossValidated { folds: usize },
}

impl fmt::Display for EvaluationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationProtocol::SingleSplit => write!(f, "single split"),
            EvaluationProtocol::CrossValidated { folds } => write!(f, "{}-fold CV", folds),
        }
    }
}

/// Outcome of one experiment on the held-out test set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub name: String,
    pub counts: ConfusionCounts,
    /// Percentage of fraud rows flagged
    pub true_positive_rate: f64,
    pub average_precision: f64,
    pub protocol: EvaluationProtocol,
}

impl ResultRecord {
    pub fn new(
        name: &str,
        counts: ConfusionCounts,
        average_precision: f64,
        protocol: EvaluationProtocol,
    ) -> Self {
        Self {
            name: name.to_string(),
            counts,
            true_positive_rate: counts.true_positive_rate(),
            average_precision,
            protocol,
        }
    }

    /// Format as a table row
    pub fn to_table_row(&self) -> String {
        format!(
            "| {:<24} | {:>4}/{:<4} | {:>7.2}% | {:>6} | {:>9.4} | {:<14} |",
            self.name,
            self.counts.tp,
            self.counts.actual_positive(),
            self.true_positive_rate,
            self.counts.fp,
            self.average_precision,
            self.protocol.to_string(),
        )
    }

    pub fn table_header() -> String {
        format!(
            "| {:<24} | {:>9} | {:>8} | {:>6} | {:>9} | {:<14} |",
            "Experiment", "TP", "TP rate", "FP", "Avg prec", "Protocol"
        )
    }

    pub fn table_separator() -> String {
        format!(
            "|{:-<26}|{:->11}|{:->10}|{:->8}|{:->11}|{:-<16}|",
            "", "", "", "", "", ""
        )
    }
}

/// Ordered, append-only list of result records.
///
/// Adding a record consumes the collector and returns the extended one, so a
/// record can never be changed once it is in the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultsCollector {
    records: Vec<ResultRecord>,
}

impl ResultsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: ResultRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Append every record of `other` after this collector's records
    pub fn merge(mut self, other: ResultsCollector) -> Self {
        self.records.extend(other.records);
        self
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// First record with the given experiment name
    pub fn get(&self, name: &str) -> Option<&ResultRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the comparison table, one row per record in insertion order
    pub fn table(&self) -> Vec<String> {
        let mut lines = vec![ResultRecord::table_header(), ResultRecord::table_separator()];
        lines.extend(self.records.iter().map(ResultRecord::to_table_row));
        lines
    }
}

/// Everything a run produced, serialized as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Seed of the outer train/test split
    pub seed: u64,
    pub records: ResultsCollector,
    /// Per-epoch autoencoder losses, when a latent experiment ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoencoder_history: Option<Vec<EpochLoss>>,
}

impl ExperimentReport {
    pub fn new(seed: u64, records: ResultsCollector, autoencoder_history: Option<Vec<EpochLoss>>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            seed,
            records,
            autoencoder_history,
        }
    }

    /// Write the report as pretty-printed JSON, creating parent directories
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, tp: usize) -> ResultRecord {
        let counts = ConfusionCounts {
            tp,
            tn: 90,
            fp: 5,
            fn_: 10 - tp,
        };
        ResultRecord::new(name, counts, 0.75, EvaluationProtocol::SingleSplit)
    }

    #[test]
    fn test_collector_preserves_order() {
        let collector = ResultsCollector::new()
            .with_record(record("baseline", 7))
            .with_record(record("smote", 9));

        let names: Vec<_> = collector.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["baseline", "smote"]);
        assert!((collector.get("baseline").unwrap().true_positive_rate - 70.0).abs() < 1e-12);
        assert!(collector.get("missing").is_none());
    }

    #[test]
    fn test_merge_appends() {
        let left = ResultsCollector::new().with_record(record("a", 1));
        let right = ResultsCollector::new()
            .with_record(record("b", 2))
            .with_record(record("c", 3));

        let merged = left.clone().merge(right);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.records()[0], left.records()[0]);
        assert_eq!(merged.records()[2].name, "c");
    }

    #[test]
    fn test_table_rows_line_up() {
        let collector = ResultsCollector::new().with_record(record("baseline", 7));
        let table = collector.table();
        assert_eq!(table.len(), 3);
        assert!(table[2].contains("baseline"));
        assert!(table[2].contains("7/10"));
        assert_eq!(table[0].len(), table[2].len());
        assert_eq!(table[0].len(), table[1].len());
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(EvaluationProtocol::SingleSplit.to_string(), "single split");
        assert_eq!(
            EvaluationProtocol::CrossValidated { folds: 5 }.to_string(),
            "5-fold CV"
        );
    }

    #[test]
    fn test_report_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let report = ExperimentReport::new(42, ResultsCollector::new().with_record(record("x", 4)), None);
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["seed"], 42);
        assert_eq!(value["records"][0]["name"], "x");
        assert_eq!(value["records"][0]["counts"]["tp"], 4);
        assert_eq!(value["records"][0]["protocol"]["kind"], "single_split");
        assert!(value.get("autoencoder_history").is_none());
    }
}
