//! Transaction records for credit card fraud detection

use serde::{Deserialize, Serialize};

/// Label value for a legitimate transaction
pub const NORMAL: u8 = 0;
/// Label value for a fraudulent transaction
pub const FRAUD: u8 = 1;

/// One row of the anonymized credit card transaction table.
///
/// `V1`..`V28` are PCA components released in place of the raw card data.
/// `Class` is ground truth and is never derived from the features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Seconds elapsed since the first transaction in the table
    #[serde(rename = "Time")]
    pub time: f64,

    /// Anonymized principal component 1
    #[serde(rename = "V1")]
    pub v1: f64,

    /// Anonymized principal component 2
    #[serde(rename = "V2")]
    pub v2: f64,

    /// Anonymized principal component 3
    #[serde(rename = "V3")]
    pub v3: f64,

    /// Anonymized principal component 4
    #[serde(rename = "V4")]
    pub v4: f64,

    /// Anonymized principal component 5
    #[serde(rename = "V5")]
    pub v5: f64,

    /// Anonymized principal component 6
    #[serde(rename = "V6")]
    pub v6: f64,

    /// Anonymized principal component 7
    #[serde(rename = "V7")]
    pub v7: f64,

    /// Anonymized principal component 8
    #[serde(rename = "V8")]
    pub v8: f64,

    /// Anonymized principal component 9
    #[serde(rename = "V9")]
    pub v9: f64,

    /// Anonymized principal component 10
    #[serde(rename = "V10")]
    pub v10: f64,

    /// Anonymized principal component 11
    #[serde(rename = "V11")]
    pub v11: f64,

    /// Anonymized principal component 12
    #[serde(rename = "V12")]
    pub v12: f64,

    /// Anonymized principal component 13
    #[serde(rename = "V13")]
    pub v13: f64,

    /// Anonymized principal component 14
    #[serde(rename = "V14")]
    pub v14: f64,

    /// Anonymized principal component 15
    #[serde(rename = "V15")]
    pub v15: f64,

    /// Anonymized principal component 16
    #[serde(rename = "V16")]
    pub v16: f64,

    /// Anonymized principal component 17
    #[serde(rename = "V17")]
    pub v17: f64,

    /// Anonymized principal component 18
    #[serde(rename = "V18")]
    pub v18: f64,

    /// Anonymized principal component 19
    #[serde(rename = "V19")]
    pub v19: f64,

    /// Anonymized principal component 20
    #[serde(rename = "V20")]
    pub v20: f64,

    /// Anonymized principal component 21
    #[serde(rename = "V21")]
    pub v21: f64,

    /// Anonymized principal component 22
    #[serde(rename = "V22")]
    pub v22: f64,

    /// Anonymized principal component 23
    #[serde(rename = "V23")]
    pub v23: f64,

    /// Anonymized principal component 24
    #[serde(rename = "V24")]
    pub v24: f64,

    /// Anonymized principal component 25
    #[serde(rename = "V25")]
    pub v25: f64,

    /// Anonymized principal component 26
    #[serde(rename = "V26")]
    pub v26: f64,

    /// Anonymized principal component 27
    #[serde(rename = "V27")]
    pub v27: f64,

    /// Anonymized principal component 28
    #[serde(rename = "V28")]
    pub v28: f64,

    /// Transaction amount
    #[serde(rename = "Amount")]
    pub amount: f64,

    /// 0 = normal, 1 = fraud
    #[serde(rename = "Class")]
    pub class: u8,
}

impl TransactionRecord {
    /// Create a record with all principal components zeroed
    pub fn new(time: f64, amount: f64, class: u8) -> Self {
        Self {
            time,
            amount,
            class,
            ..Self::default()
        }
    }

    /// Principal components in column order
    pub fn components(&self) -> [f64; 28] {
        [
            self.v1,
            self.v2,
            self.v3,
            self.v4,
            self.v5,
            self.v6,
            self.v7,
            self.v8,
            self.v9,
            self.v10,
            self.v11,
            self.v12,
            self.v13,
            self.v14,
            self.v15,
            self.v16,
            self.v17,
            self.v18,
            self.v19,
            self.v20,
            self.v21,
            self.v22,
            self.v23,
            self.v24,
            self.v25,
            self.v26,
            self.v27,
            self.v28,
        ]
    }

    /// Overwrite principal components in column order
    pub fn set_components(&mut self, values: &[f64; 28]) {
        self.v1 = values[0];
        self.v2 = values[1];
        self.v3 = values[2];
        self.v4 = values[3];
        self.v5 = values[4];
        self.v6 = values[5];
        self.v7 = values[6];
        self.v8 = values[7];
        self.v9 = values[8];
        self.v10 = values[9];
        self.v11 = values[10];
        self.v12 = values[11];
        self.v13 = values[12];
        self.v14 = values[13];
        self.v15 = values[14];
        self.v16 = values[15];
        self.v17 = values[16];
        self.v18 = values[17];
        self.v19 = values[18];
        self.v20 = values[19];
        self.v21 = values[20];
        self.v22 = values[21];
        self.v23 = values[22];
        self.v24 = values[23];
        self.v25 = values[24];
        self.v26 = values[25];
        self.v27 = values[26];
        self.v28 = values[27];
    }

    pub fn is_fraud(&self) -> bool {
        self.class == FRAUD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_csv_headers() {
        let mut tx = TransactionRecord::new(10.0, 149.62, FRAUD);
        tx.v3 = -1.5;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&tx).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();

        assert!(header.starts_with("Time,V1,V2,V3"));
        assert!(header.ends_with("V28,Amount,Class"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let parsed: TransactionRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(parsed, tx);
        assert!(parsed.is_fraud());
    }

    #[test]
    fn test_new_zeroes_components() {
        let tx = TransactionRecord::new(3.0, 42.5, FRAUD);
        assert_eq!(tx.components(), [0.0; 28]);
        assert_eq!((tx.time, tx.amount, tx.class), (3.0, 42.5, FRAUD));
    }

    #[test]
    fn test_components_order() {
        let mut tx = TransactionRecord::new(0.0, 0.0, NORMAL);
        let mut values = [0.0; 28];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f64;
        }
        tx.set_components(&values);

        assert_eq!(tx.v1, 0.0);
        assert_eq!(tx.v28, 27.0);
        assert_eq!(tx.components(), values);
    }
}
