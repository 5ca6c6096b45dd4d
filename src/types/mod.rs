//! Type definitions for the evaluation harness

pub mod dataset;
pub mod result;
pub mod transaction;

pub use dataset::{ClassCounts, Dataset};
pub use result::{EvaluationProtocol, ExperimentReport, ResultRecord, ResultsCollector};
pub use transaction::TransactionRecord;
