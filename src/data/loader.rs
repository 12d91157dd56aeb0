//! CSV dataset loading
//!
//! Reads a channel-statistics snapshot into loosely-typed records. Legacy
//! exports are latin-1 encoded, so cells are decoded lossily rather than
//! rejected, and the usual spreadsheet spellings of "not available" become
//! missing values.

use crate::{RawRecord, RawValue, Result};
use std::path::Path;

/// Cell spellings treated as missing, matching common CSV export conventions
const NA_VALUES: [&str; 8] = ["", "nan", "NaN", "NAN", "NA", "N/A", "null", "NULL"];

/// A loaded dataset snapshot: the column set plus one raw record per row
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl Dataset {
    /// Load a snapshot from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let columns: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            let mut row = RawRecord::new();
            for (i, cell) in record.iter().enumerate() {
                let Some(name) = columns.get(i) else {
                    continue;
                };
                let text = String::from_utf8_lossy(cell);
                let text = text.trim();
                let value = if NA_VALUES.contains(&text) {
                    RawValue::Missing
                } else {
                    RawValue::Text(text.to_string())
                };
                row.insert(name.clone(), value);
            }
            rows.push(row);
        }

        log::info!(
            "Loaded {} rows, {} columns from {}",
            rows.len(),
            columns.len(),
            path.display()
        );

        Ok(Dataset { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}
