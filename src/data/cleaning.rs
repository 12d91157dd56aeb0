//! Record cleaning
//!
//! Turns a raw snapshot into analysis-ready rows: column pruning, imputation,
//! count coercion and sanity filters. A single prediction record instead gets
//! fixed request-time defaults; medians are a training-time concept and do
//! not exist at request time.

use crate::data::Dataset;
use crate::{CleanValue, CleanedRecord, RawRecord, RawValue};
use std::collections::BTreeMap;

/// Columns outside the modeling scope, dropped wherever they appear
pub const DROPPED_COLUMNS: [&str; 10] = [
    "rank",
    "Abbreviation",
    "country_rank",
    "created_month",
    "created_date",
    "Gross tertiary education enrollment (%)",
    "Unemployment rate",
    "Urban_population",
    "Latitude",
    "Longitude",
];

/// Count columns coerced to whole numbers; unparseable cells become 0
pub const COUNT_COLUMNS: [&str; 3] = ["subscribers", "video views", "uploads"];

/// Sentinel for missing categorical values
pub const UNKNOWN: &str = "Unknown";

/// Earliest channel-creation year considered sane
pub const MIN_CREATED_YEAR: f64 = 2005.0;

/// Numeric request fields backed by request-time defaults, not medians
pub(crate) const NUMERIC_REQUEST_FIELDS: [&str; 5] = [
    "subscribers",
    "video views",
    "uploads",
    "video_views_for_the_last_30_days",
    "subscribers_for_last_30_days",
];

/// Categorical request fields
const CATEGORICAL_REQUEST_FIELDS: [&str; 3] = ["category", "Country", "channel_type"];

/// A cleaned snapshot: analysis-ready rows plus the frozen imputation medians
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<CleanedRecord>,
    /// Median per numeric column, computed once here and frozen
    pub medians: BTreeMap<String, f64>,
}

impl CleanedDataset {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Clean a full dataset snapshot.
///
/// Order matters and mirrors the imputation-before-coercion rule: a count
/// column polluted with text is categorical at imputation time, so its gaps
/// become the sentinel and the sentinel then coerces to 0.
pub fn clean_dataset(dataset: &Dataset) -> CleanedDataset {
    let columns: Vec<String> = dataset
        .columns
        .iter()
        .filter(|c| !DROPPED_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect();

    let mut medians = BTreeMap::new();
    for column in &columns {
        if is_numeric_column(&dataset.rows, column) {
            let mut present: Vec<f64> = dataset
                .rows
                .iter()
                .filter_map(|row| row.get(column))
                .filter_map(RawValue::as_number)
                .collect();
            medians.insert(column.clone(), median(&mut present).unwrap_or(0.0));
        }
    }

    let mut rows: Vec<CleanedRecord> = Vec::with_capacity(dataset.rows.len());
    for row in &dataset.rows {
        let mut clean = CleanedRecord::new();
        for column in &columns {
            let value = match medians.get(column) {
                Some(median) => CleanValue::Number(
                    row.get(column)
                        .and_then(RawValue::as_number)
                        .unwrap_or(*median),
                ),
                None => match row.get(column) {
                    Some(RawValue::Text(s)) => CleanValue::Text(s.clone()),
                    Some(RawValue::Number(n)) => CleanValue::Text(display_number(*n)),
                    Some(RawValue::Missing) | None => CleanValue::Text(UNKNOWN.to_string()),
                },
            };
            clean.insert(column.clone(), value);
        }

        for column in COUNT_COLUMNS {
            if let Some(value) = clean.get_mut(column) {
                let coerced = match &*value {
                    CleanValue::Number(n) => n.trunc(),
                    CleanValue::Text(s) => {
                        s.trim().parse::<f64>().map(f64::trunc).unwrap_or(0.0)
                    }
                };
                *value = CleanValue::Number(coerced);
            }
        }

        rows.push(clean);
    }

    let total = rows.len();
    if columns.iter().any(|c| c == "video views") {
        rows.retain(|row| {
            row.get("video views")
                .and_then(CleanValue::as_number)
                .map_or(true, |views| views > 0.0)
        });
    }
    if columns.iter().any(|c| c == "created_year") {
        rows.retain(|row| {
            row.get("created_year")
                .and_then(CleanValue::as_number)
                .map_or(true, |year| year >= MIN_CREATED_YEAR)
        });
    }

    log::info!(
        "Cleaned dataset: kept {} of {} rows ({} numeric, {} categorical columns)",
        rows.len(),
        total,
        medians.len(),
        columns.len() - medians.len()
    );

    CleanedDataset {
        columns,
        rows,
        medians,
    }
}

/// Clean a single prediction record with fixed fallbacks.
///
/// The caller's record is never discarded: gaps get request-time defaults
/// (creation year falls back to a fixed year, counts to 0), malformed text in
/// numeric fields coerces to 0, and numbers in categorical fields are
/// stringified. Fields outside the known schema pass through untouched; the
/// encoder never reads them.
pub fn clean_record(record: &RawRecord, fallback_created_year: i32) -> CleanedRecord {
    let mut clean = CleanedRecord::new();

    for field in NUMERIC_REQUEST_FIELDS {
        let number = record
            .get(field)
            .and_then(RawValue::as_number)
            .unwrap_or(0.0);
        let number = if COUNT_COLUMNS.contains(&field) {
            number.trunc()
        } else {
            number
        };
        clean.insert(field.to_string(), CleanValue::Number(number));
    }

    let year = record
        .get("created_year")
        .and_then(RawValue::as_number)
        .unwrap_or(f64::from(fallback_created_year));
    clean.insert("created_year".to_string(), CleanValue::Number(year));

    for field in CATEGORICAL_REQUEST_FIELDS {
        let value = match record.get(field) {
            Some(RawValue::Text(s)) => s.clone(),
            Some(RawValue::Number(n)) => display_number(*n),
            Some(RawValue::Missing) | None => UNKNOWN.to_string(),
        };
        clean.insert(field.to_string(), CleanValue::Text(value));
    }

    for (name, value) in record {
        if clean.contains_key(name) || DROPPED_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        match value {
            RawValue::Number(n) => {
                clean.insert(name.clone(), CleanValue::Number(*n));
            }
            RawValue::Text(s) => {
                clean.insert(name.clone(), CleanValue::Text(s.clone()));
            }
            RawValue::Missing => {}
        }
    }

    clean
}

/// A column is numeric when every present cell has a numeric reading
fn is_numeric_column(rows: &[RawRecord], column: &str) -> bool {
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_missing())
        .all(|value| value.as_number().is_some())
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Render a number the way it would have appeared in a text cell
pub(crate) fn display_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
