//! Loading the transaction table from disk.
//!
//! The CSV is read in full and checked against the expected schema before any
//! experiment runs. A missing CSV is extracted from its gzip archive when one is
//! configured.

use crate::config::DataConfig;
use crate::error::{HarnessError, Result};
use crate::types::dataset::Dataset;
use crate::types::transaction::TransactionRecord;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tracing::{info, warn};

/// Load and validate the dataset described by `config`
pub fn load_dataset(config: &DataConfig) -> Result<Dataset> {
    let path = Path::new(&config.path);

    if !path.exists() {
        match &config.archive_path {
            Some(archive) if Path::new(archive).exists() => {
                let bytes = extract_archive(archive, path)?;
                info!(archive = %archive, path = %path.display(), bytes, "Extracted dataset archive");
            }
            Some(archive) => {
                return Err(HarnessError::precondition(format!(
                    "neither {} nor archive {} exists",
                    path.display(),
                    archive
                )));
            }
            None => {
                return Err(HarnessError::precondition(format!(
                    "dataset {} does not exist",
                    path.display()
                )));
            }
        }
    }

    let file = File::open(path)?;
    let dataset = read_csv(BufReader::new(file), config.expected_columns)?;

    if dataset.len() < config.min_rows {
        return Err(HarnessError::precondition(format!(
            "dataset has {} rows, expected at least {}",
            dataset.len(),
            config.min_rows
        )));
    }

    let counts = dataset.class_counts();
    if counts.fraud == 0 || counts.normal == 0 {
        return Err(HarnessError::precondition(format!(
            "dataset must contain both classes (normal={}, fraud={})",
            counts.normal, counts.fraud
        )));
    }

    info!(
        path = %path.display(),
        rows = dataset.len(),
        normal = counts.normal,
        fraud = counts.fraud,
        fraud_ratio = format!("{:.5}", dataset.fraud_ratio()),
        "Dataset loaded"
    );

    Ok(dataset)
}

/// Decompress a gzip archive to `dest`, returning the number of bytes written
pub fn extract_archive<P: AsRef<Path>, Q: AsRef<Path>>(archive: P, dest: Q) -> Result<u64> {
    let dest = dest.as_ref();
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut decoder = GzDecoder::new(BufReader::new(File::open(archive.as_ref())?));
    let mut out = BufWriter::new(File::create(dest)?);
    match std::io::copy(&mut decoder, &mut out) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            warn!(dest = %dest.display(), error = %e, "Archive extraction failed, removing partial file");
            drop(out);
            let _ = std::fs::remove_file(dest);
            Err(e.into())
        }
    }
}

/// Parse CSV rows into a dataset, asserting the column count and label column
pub fn read_csv<R: Read>(reader: R, expected_columns: usize) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.len() != expected_columns {
        return Err(HarnessError::precondition(format!(
            "expected {} columns, found {}",
            expected_columns,
            headers.len()
        )));
    }
    if !headers.iter().any(|h| h == "Class") {
        return Err(HarnessError::precondition("no Class column in header"));
    }

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<TransactionRecord>().enumerate() {
        let record = row.map_err(|e| {
            HarnessError::precondition(format!("malformed row {}: {}", line + 1, e))
        })?;
        records.push(record);
    }

    Dataset::from_records(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SyntheticGenerator;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_csv(path: &Path, rows: usize) {
        let mut generator = SyntheticGenerator::new(7);
        let records = generator.generate(rows, 0.1);
        let mut writer = csv::Writer::from_path(path).unwrap();
        for r in &records {
            writer.serialize(r).unwrap();
        }
        writer.flush().unwrap();
    }

    fn data_config(path: &Path, min_rows: usize) -> DataConfig {
        DataConfig {
            path: path.display().to_string(),
            archive_path: None,
            expected_columns: 31,
            min_rows,
        }
    }

    #[test]
    fn test_load_valid_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.csv");
        write_csv(&path, 200);

        let dataset = load_dataset(&data_config(&path, 100)).unwrap();
        assert_eq!(dataset.len(), 200);
        assert_eq!(dataset.n_features(), 30);
        assert!(dataset.class_counts().fraud > 0);
    }

    #[test]
    fn test_too_few_rows_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.csv");
        write_csv(&path, 50);

        let err = load_dataset(&data_config(&path, 100)).unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[test]
    fn test_wrong_column_count_fails() {
        let csv = "Time,Amount,Class\n0,1.0,0\n";
        let err = read_csv(csv.as_bytes(), 31).unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[test]
    fn test_malformed_row_fails() {
        let mut header: Vec<String> = vec!["Time".into()];
        header.extend((1..=28).map(|i| format!("V{}", i)));
        header.push("Amount".into());
        header.push("Class".into());
        let mut row = vec!["0".to_string(); 30];
        row.push("not-a-label".to_string());
        let csv = format!("{}\n{}\n", header.join(","), row.join(","));

        let err = read_csv(csv.as_bytes(), 31).unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[test]
    fn test_non_finite_feature_fails() {
        let mut header: Vec<String> = vec!["Time".into()];
        header.extend((1..=28).map(|i| format!("V{}", i)));
        header.push("Amount".into());
        header.push("Class".into());
        let mut row = vec!["0".to_string(); 29];
        row[5] = "NaN".to_string();
        row.push("inf".to_string());
        row.push("0".to_string());
        let csv = format!("{}\n{}\n", header.join(","), row.join(","));

        match read_csv(csv.as_bytes(), 31).unwrap_err() {
            HarnessError::Precondition(msg) => assert!(msg.contains("row 0, column 5"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_extracts_missing_csv_from_archive() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("source.csv");
        write_csv(&plain, 120);

        let archive = dir.path().join("tx.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
        encoder.write_all(&std::fs::read(&plain).unwrap()).unwrap();
        encoder.finish().unwrap();

        let target = dir.path().join("data").join("tx.csv");
        let mut config = data_config(&target, 100);
        config.archive_path = Some(archive.display().to_string());

        let dataset = load_dataset(&config).unwrap();
        assert_eq!(dataset.len(), 120);
        assert!(target.exists());
    }

    #[test]
    fn test_missing_everything_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = data_config(&dir.path().join("absent.csv"), 1);
        assert!(matches!(
            load_dataset(&config).unwrap_err(),
            HarnessError::Precondition(_)
        ));
    }
}
