//! End-to-end training pipeline
//!
//! Orchestrates a full run: load the snapshot, clean it, engineer features,
//! split, fit the encoder and forest on the training partition and evaluate
//! on the held-out rows.

use std::time::{Duration, Instant};

use aprender::metrics::{r_squared, rmse};
use aprender::primitives::{Matrix, Vector};
use aprender::tree::RandomForestRegressor;
use chrono::{Datelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::{clean_dataset, CleanedDataset, Dataset};
use crate::features::{earnings_per_subscriber, ChannelFeatures, FeatureEncoder};
use crate::model::artifact::TrainingMeta;
use crate::model::TrainedArtifact;
use crate::training::EvalMetrics;
use crate::{CleanValue, CleanedRecord, Config, EarncastError, Result};

const LOWEST_EARNINGS: &str = "lowest_yearly_earnings";
const HIGHEST_EARNINGS: &str = "highest_yearly_earnings";

/// Outcome of a completed training run
#[derive(Debug)]
pub struct TrainingReport {
    pub artifact: TrainedArtifact,
    pub elapsed: Duration,
}

/// How the training target is derived from the earnings columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetRule {
    /// Midpoint of the published low/high yearly range
    Midpoint,
    /// High bound alone, when the low bound column is absent
    HighestOnly,
}

impl TargetRule {
    fn for_dataset(cleaned: &CleanedDataset) -> Result<Self> {
        // A present but non-numeric earnings column would read as 0 for
        // every row; abort rather than train on a wrong label.
        for column in [LOWEST_EARNINGS, HIGHEST_EARNINGS] {
            if cleaned.has_column(column) && !cleaned.medians.contains_key(column) {
                return Err(EarncastError::MissingTarget(format!(
                    "column `{}` has non-numeric cells",
                    column
                )));
            }
        }

        let has_lowest = cleaned.has_column(LOWEST_EARNINGS);
        let has_highest = cleaned.has_column(HIGHEST_EARNINGS);
        match (has_lowest, has_highest) {
            (true, true) => Ok(TargetRule::Midpoint),
            (false, true) => Ok(TargetRule::HighestOnly),
            _ => Err(EarncastError::MissingTarget(format!(
                "dataset has no `{}` column",
                HIGHEST_EARNINGS
            ))),
        }
    }

    fn value(&self, record: &CleanedRecord) -> f64 {
        let get = |column: &str| {
            record
                .get(column)
                .and_then(CleanValue::as_number)
                .unwrap_or(0.0)
        };
        match self {
            TargetRule::Midpoint => (get(LOWEST_EARNINGS) + get(HIGHEST_EARNINGS)) / 2.0,
            TargetRule::HighestOnly => get(HIGHEST_EARNINGS),
        }
    }

    fn column_label(&self) -> String {
        match self {
            TargetRule::Midpoint => {
                format!("mean({}, {})", LOWEST_EARNINGS, HIGHEST_EARNINGS)
            }
            TargetRule::HighestOnly => HIGHEST_EARNINGS.to_string(),
        }
    }
}

/// Train from the configured CSV snapshot and persist the artifact
pub fn train(config: &Config) -> Result<TrainingReport> {
    let dataset = Dataset::from_csv(&config.data.dataset_path)?;
    let cleaned = clean_dataset(&dataset);
    let report = train_cleaned(config, &cleaned, dataset.len(), Utc::now().year())?;
    report.artifact.save(&config.data.artifact_path)?;
    Ok(report)
}

/// Train from an already cleaned dataset.
///
/// `current_year` feeds channel age; callers outside tests pass the wall
/// clock year.
pub fn train_cleaned(
    config: &Config,
    cleaned: &CleanedDataset,
    raw_rows: usize,
    current_year: i32,
) -> Result<TrainingReport> {
    let started = Instant::now();

    if cleaned.rows.is_empty() {
        return Err(EarncastError::Dataset(
            "No rows survived cleaning".to_string(),
        ));
    }

    let rule = TargetRule::for_dataset(cleaned)?;
    log::info!("Training target: {}", rule.column_label());
    log_earnings_rate_summary(cleaned);

    let features: Vec<ChannelFeatures> = cleaned
        .rows
        .iter()
        .map(|r| {
            ChannelFeatures::from_record(r, current_year, config.inference.fallback_created_year)
        })
        .collect();
    let targets: Vec<f64> = cleaned.rows.iter().map(|r| rule.value(r)).collect();

    let (train_idx, test_idx) = split_indices(
        features.len(),
        config.training.test_size,
        config.training.seed,
    );
    log::info!(
        "Split: {} train / {} test rows (seed {})",
        train_idx.len(),
        test_idx.len(),
        config.training.seed
    );

    let train_features: Vec<ChannelFeatures> =
        train_idx.iter().map(|&i| features[i].clone()).collect();
    let encoder = FeatureEncoder::fit(&train_features);
    let feature_names = encoder.feature_names();
    log::info!("Encoded feature width: {}", encoder.width());

    let x_train = design_matrix(&encoder, &features, &train_idx)?;
    let y_train = target_vector(&targets, &train_idx);

    let mut regressor = RandomForestRegressor::new(config.training.n_estimators)
        .with_random_state(config.training.seed);
    if let Some(depth) = config.training.max_depth {
        regressor = regressor.with_max_depth(depth);
    }
    log::info!(
        "Training random forest ({} trees)...",
        config.training.n_estimators
    );
    regressor
        .fit(&x_train, &y_train)
        .map_err(|e| EarncastError::Model(format!("Training failed: {}", e)))?;

    let metrics = if test_idx.is_empty() {
        log::warn!("Test partition is empty; skipping held-out evaluation");
        EvalMetrics::new(0.0, 0.0, &[], &[])
    } else {
        let x_test = design_matrix(&encoder, &features, &test_idx)?;
        let y_test = target_vector(&targets, &test_idx);
        let predictions = regressor.predict(&x_test);

        let rmse_score = f64::from(rmse(&predictions, &y_test));
        let mut r2_score = f64::from(r_squared(&predictions, &y_test));
        if !r2_score.is_finite() {
            log::warn!("R² undefined on this test partition; recording 0");
            r2_score = 0.0;
        }
        EvalMetrics::new(rmse_score, r2_score, y_test.as_slice(), predictions.as_slice())
    };
    log::info!("Evaluation: {}", metrics);

    let artifact = TrainedArtifact {
        encoder,
        medians: cleaned.medians.clone(),
        regressor,
        feature_names,
        metrics,
        meta: TrainingMeta {
            trained_at: Utc::now(),
            dataset_rows: raw_rows,
            cleaned_rows: cleaned.rows.len(),
            train_rows: train_idx.len(),
            target_column: rule.column_label(),
            seed: config.training.seed,
        },
    };

    Ok(TrainingReport {
        artifact,
        elapsed: started.elapsed(),
    })
}

/// Deterministic shuffled split. The test partition gets
/// `round(n * test_size)` rows; the first `n - n_test` shuffled indices
/// train.
fn split_indices(n: usize, test_size: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = (n as f32 * test_size).round() as usize;
    let n_train = n.saturating_sub(n_test);
    let test = indices.split_off(n_train);
    (indices, test)
}

fn design_matrix(
    encoder: &FeatureEncoder,
    features: &[ChannelFeatures],
    indices: &[usize],
) -> Result<Matrix<f32>> {
    let width = encoder.width();
    let mut data = Vec::with_capacity(indices.len() * width);
    for &i in indices {
        data.extend(encoder.transform(&features[i]).into_iter().map(|v| v as f32));
    }
    Matrix::from_vec(indices.len(), width, data)
        .map_err(|e| EarncastError::Model(format!("Failed to assemble design matrix: {}", e)))
}

fn target_vector(targets: &[f64], indices: &[usize]) -> Vector<f32> {
    Vector::from_vec(indices.iter().map(|&i| targets[i] as f32).collect())
}

/// Dataset-level earnings rate summary, logged at debug level only
fn log_earnings_rate_summary(cleaned: &CleanedDataset) {
    if !log::log_enabled!(log::Level::Debug) || cleaned.rows.is_empty() {
        return;
    }
    let mut rates: Vec<f64> = cleaned.rows.iter().map(earnings_per_subscriber).collect();
    rates.sort_by(f64::total_cmp);
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    let median = rates[rates.len() / 2];
    log::debug!(
        "Earnings per subscriber across {} channels: mean {:.4}, median {:.4}, max {:.4}",
        rates.len(),
        mean,
        median,
        rates[rates.len() - 1]
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawRecord, RawValue};
    use std::collections::BTreeMap;

    fn record(
        subscribers: f64,
        views: f64,
        lowest: Option<f64>,
        highest: Option<f64>,
    ) -> CleanedRecord {
        let mut row = BTreeMap::new();
        row.insert(
            "subscribers".to_string(),
            CleanValue::Number(subscribers),
        );
        row.insert("video views".to_string(), CleanValue::Number(views));
        row.insert("uploads".to_string(), CleanValue::Number(100.0));
        row.insert("created_year".to_string(), CleanValue::Number(2015.0));
        row.insert(
            "category".to_string(),
            CleanValue::Text("Music".to_string()),
        );
        row.insert("Country".to_string(), CleanValue::Text("US".to_string()));
        row.insert(
            "channel_type".to_string(),
            CleanValue::Text("Music".to_string()),
        );
        if let Some(v) = lowest {
            row.insert(LOWEST_EARNINGS.to_string(), CleanValue::Number(v));
        }
        if let Some(v) = highest {
            row.insert(HIGHEST_EARNINGS.to_string(), CleanValue::Number(v));
        }
        row
    }

    /// Mark every numeric column with a median, mirroring the cleaner's
    /// column classification
    fn medians_for(rows: &[CleanedRecord]) -> BTreeMap<String, f64> {
        rows.first()
            .map(|row| {
                row.iter()
                    .filter_map(|(name, value)| value.as_number().map(|n| (name.clone(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn synthetic_dataset(n: usize) -> CleanedDataset {
        let mut rows = Vec::new();
        for i in 0..n {
            let scale = (i + 1) as f64;
            rows.push(record(
                10_000.0 * scale,
                500_000.0 * scale,
                Some(1_000.0 * scale),
                Some(3_000.0 * scale),
            ));
        }
        CleanedDataset {
            columns: rows[0].keys().cloned().collect(),
            medians: medians_for(&rows),
            rows,
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.training.n_estimators = 10;
        config
    }

    #[test]
    fn test_target_rule_prefers_range_midpoint() {
        let dataset = synthetic_dataset(3);
        let rule = TargetRule::for_dataset(&dataset).unwrap();
        assert_eq!(rule, TargetRule::Midpoint);

        let row = record(1.0, 1.0, Some(100.0), Some(300.0));
        assert_eq!(rule.value(&row), 200.0);
    }

    #[test]
    fn test_target_rule_falls_back_to_highest() {
        let rows = vec![record(1.0, 1.0, None, Some(300.0))];
        let dataset = CleanedDataset {
            columns: rows[0].keys().cloned().collect(),
            medians: medians_for(&rows),
            rows,
        };
        let rule = TargetRule::for_dataset(&dataset).unwrap();
        assert_eq!(rule, TargetRule::HighestOnly);
        assert_eq!(rule.value(&dataset.rows[0]), 300.0);
    }

    #[test]
    fn test_lowest_alone_is_not_a_target() {
        let rows = vec![record(1.0, 1.0, Some(100.0), None)];
        let dataset = CleanedDataset {
            columns: rows[0].keys().cloned().collect(),
            medians: medians_for(&rows),
            rows,
        };
        let err = TargetRule::for_dataset(&dataset).unwrap_err();
        assert!(matches!(err, EarncastError::MissingTarget(_)));
    }

    #[test]
    fn test_polluted_target_column_aborts_training() {
        let mut raw_rows = Vec::new();
        for i in 0..12 {
            let mut row = RawRecord::new();
            row.insert(
                "subscribers".to_string(),
                RawValue::Number(f64::from(1_000 * (i + 1))),
            );
            row.insert(
                "video views".to_string(),
                RawValue::Number(f64::from(50_000 * (i + 1))),
            );
            row.insert(
                LOWEST_EARNINGS.to_string(),
                RawValue::Number(40_000.0),
            );
            let highest = if i == 5 {
                RawValue::Text("confidential".to_string())
            } else {
                RawValue::Number(80_000.0)
            };
            row.insert(HIGHEST_EARNINGS.to_string(), highest);
            raw_rows.push(row);
        }
        let dataset = Dataset {
            columns: raw_rows[0].keys().cloned().collect(),
            rows: raw_rows,
        };

        // One junk cell makes the cleaner classify the whole column
        // categorical; the midpoint would silently halve the lowest bound.
        let cleaned = clean_dataset(&dataset);
        assert!(!cleaned.medians.contains_key(HIGHEST_EARNINGS));

        let err = train_cleaned(&test_config(), &cleaned, dataset.len(), 2023).unwrap_err();
        match err {
            EarncastError::MissingTarget(msg) => {
                assert!(msg.contains(HIGHEST_EARNINGS), "{}", msg);
            }
            other => panic!("expected MissingTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_split_is_seeded_and_rounded() {
        let (train_a, test_a) = split_indices(10, 0.2, 42);
        let (train_b, test_b) = split_indices(10, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.len(), 8);
        assert_eq!(test_a.len(), 2);

        let (train_c, _) = split_indices(10, 0.2, 7);
        assert_ne!(train_a, train_c);
    }

    #[test]
    fn test_split_partitions_every_index_once() {
        let (train, test) = split_indices(25, 0.2, 42);
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_cleaned_end_to_end() {
        let dataset = synthetic_dataset(30);
        let config = test_config();

        let report = train_cleaned(&config, &dataset, 35, 2023).unwrap();
        let artifact = &report.artifact;

        assert!(artifact.metrics.rmse.is_finite());
        assert!(artifact.metrics.r2.is_finite());
        assert_eq!(artifact.metrics.test_rows, 6);
        assert_eq!(artifact.meta.dataset_rows, 35);
        assert_eq!(artifact.meta.cleaned_rows, 30);
        assert_eq!(artifact.meta.train_rows, 24);
        assert_eq!(
            artifact.meta.target_column,
            "mean(lowest_yearly_earnings, highest_yearly_earnings)"
        );
        assert_eq!(artifact.feature_names, artifact.encoder.feature_names());
        artifact.verify_layout().unwrap();
    }

    #[test]
    fn test_training_is_reproducible() {
        let dataset = synthetic_dataset(30);
        let config = test_config();

        let first = train_cleaned(&config, &dataset, 30, 2023).unwrap();
        let second = train_cleaned(&config, &dataset, 30, 2023).unwrap();

        assert_eq!(first.artifact.metrics.rmse, second.artifact.metrics.rmse);
        assert_eq!(first.artifact.metrics.r2, second.artifact.metrics.r2);
        assert_eq!(first.artifact.metrics.samples, second.artifact.metrics.samples);
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let dataset = CleanedDataset {
            columns: Vec::new(),
            rows: Vec::new(),
            medians: BTreeMap::new(),
        };
        let err = train_cleaned(&test_config(), &dataset, 0, 2023).unwrap_err();
        assert!(matches!(err, EarncastError::Dataset(_)));
    }
}
