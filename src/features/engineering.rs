//! Channel feature derivation
//!
//! One shared derivation turns a cleaned record into engineered features, so
//! the bulk training path and the single-record inference path cannot drift
//! apart. Every source column has an explicit default; a snapshot missing a
//! column degrades to the default instead of aborting.

use crate::data::cleaning::{display_number, UNKNOWN};
use crate::{CleanValue, CleanedRecord};

/// Division that yields 0 for a non-positive denominator instead of
/// raising or producing infinity
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b > 0.0 {
        a / b
    } else {
        0.0
    }
}

/// Engineered features for one channel: the numeric block plus the
/// categorical fields the encoder expands.
///
/// Source columns and absence defaults:
/// - `subscribers`, `video views`, `uploads`: pass-through counts, 0
/// - `views_per_upload`: `video views` / `uploads` via [`safe_div`]
/// - `subscribers_growth_rate`: `subscribers_for_last_30_days` /
///   `subscribers`, 0 when the 30-day column is absent
/// - `video_views_growth_rate`: `video_views_for_the_last_30_days` /
///   `video views`, 0 when the 30-day column is absent
/// - `channel_age_years`: current year minus `created_year`, with the
///   fallback year standing in for a missing creation year; negative ages
///   pass through unclamped
/// - `category`, `Country`, `channel_type`: "Unknown" when absent
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFeatures {
    pub subscribers: f64,
    pub video_views: f64,
    pub uploads: f64,
    pub views_per_upload: f64,
    pub subscribers_growth_rate: f64,
    pub video_views_growth_rate: f64,
    pub channel_age_years: f64,
    pub category: String,
    pub country: String,
    pub channel_type: String,
}

impl ChannelFeatures {
    /// Width of the numeric block
    pub const NUMERIC_DIM: usize = 7;

    /// Names of the numeric block, in vector order
    pub const NUMERIC_NAMES: [&'static str; Self::NUMERIC_DIM] = [
        "subscribers",
        "video views",
        "uploads",
        "views_per_upload",
        "subscribers_growth_rate",
        "video_views_growth_rate",
        "channel_age_years",
    ];

    /// Categorical source columns, in indicator-block order
    pub const CATEGORICAL_FIELDS: [&'static str; 3] = ["category", "Country", "channel_type"];

    /// Derive features from a cleaned record
    pub fn from_record(
        record: &CleanedRecord,
        current_year: i32,
        fallback_created_year: i32,
    ) -> Self {
        let subscribers = number(record, "subscribers");
        let video_views = number(record, "video views");
        let uploads = number(record, "uploads");
        let subs_30d = number(record, "subscribers_for_last_30_days");
        let views_30d = number(record, "video_views_for_the_last_30_days");

        let created_year = record
            .get("created_year")
            .and_then(CleanValue::as_number)
            .unwrap_or(f64::from(fallback_created_year));

        ChannelFeatures {
            subscribers,
            video_views,
            uploads,
            views_per_upload: safe_div(video_views, uploads),
            subscribers_growth_rate: safe_div(subs_30d, subscribers),
            video_views_growth_rate: safe_div(views_30d, video_views),
            channel_age_years: f64::from(current_year) - created_year,
            category: text(record, "category"),
            country: text(record, "Country"),
            channel_type: text(record, "channel_type"),
        }
        .scrubbed()
    }

    /// The numeric block in vector order
    pub fn numeric_vec(&self) -> Vec<f64> {
        vec![
            self.subscribers,
            self.video_views,
            self.uploads,
            self.views_per_upload,
            self.subscribers_growth_rate,
            self.video_views_growth_rate,
            self.channel_age_years,
        ]
    }

    /// Categorical values in indicator-block order
    pub fn categorical_values(&self) -> [&str; 3] {
        [&self.category, &self.country, &self.channel_type]
    }

    /// Replace any non-finite derivation with 0 before the vector finalizes
    fn scrubbed(mut self) -> Self {
        for value in [
            &mut self.subscribers,
            &mut self.video_views,
            &mut self.uploads,
            &mut self.views_per_upload,
            &mut self.subscribers_growth_rate,
            &mut self.video_views_growth_rate,
            &mut self.channel_age_years,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        self
    }
}

/// Earnings per subscriber, derived for dataset-level analysis only. It
/// divides a component of the training target by subscribers, so it never
/// enters the model feature set.
pub fn earnings_per_subscriber(record: &CleanedRecord) -> f64 {
    safe_div(
        number(record, "highest_yearly_earnings"),
        number(record, "subscribers"),
    )
}

fn number(record: &CleanedRecord, column: &str) -> f64 {
    record
        .get(column)
        .and_then(CleanValue::as_number)
        .unwrap_or(0.0)
}

fn text(record: &CleanedRecord, column: &str) -> String {
    match record.get(column) {
        Some(CleanValue::Text(s)) => s.clone(),
        Some(CleanValue::Number(n)) => display_number(*n),
        None => UNKNOWN.to_string(),
    }
}
