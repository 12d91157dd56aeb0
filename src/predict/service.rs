//! Single-record inference against the installed artifact

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use aprender::primitives::Matrix;
use chrono::{Datelike, Utc};

use crate::data::cleaning::NUMERIC_REQUEST_FIELDS;
use crate::data::clean_record;
use crate::features::ChannelFeatures;
use crate::model::TrainedArtifact;
use crate::training::EvalMetrics;
use crate::{Config, EarncastError, EarningsEstimate, RawRecord, RawValue, Result};

/// Prediction service holding at most one trained artifact.
///
/// Training installs a replacement atomically; in-flight predictions keep
/// the artifact they started with.
pub struct PredictionService {
    artifact: RwLock<Option<Arc<TrainedArtifact>>>,
    fallback_created_year: i32,
}

impl PredictionService {
    pub fn new(config: &Config) -> Self {
        PredictionService {
            artifact: RwLock::new(None),
            fallback_created_year: config.inference.fallback_created_year,
        }
    }

    /// Install a freshly trained artifact, replacing any previous one
    pub fn install(&self, artifact: TrainedArtifact) {
        let mut slot = self
            .artifact
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(artifact));
        log::info!("Artifact installed");
    }

    /// Load and install an artifact from disk
    pub fn load_from<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let artifact = TrainedArtifact::load(path)?;
        self.install(artifact);
        Ok(())
    }

    /// The installed artifact, if any
    pub fn artifact(&self) -> Option<Arc<TrainedArtifact>> {
        self.artifact
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Estimate yearly earnings for one raw channel record
    pub fn predict(&self, record: &RawRecord) -> Result<EarningsEstimate> {
        self.predict_at(record, Utc::now().year())
    }

    /// `current_year` feeds channel age; callers outside tests pass the
    /// wall clock year.
    pub fn predict_at(&self, record: &RawRecord, current_year: i32) -> Result<EarningsEstimate> {
        let artifact = self.artifact().ok_or(EarncastError::NotReady)?;

        check_finite(record)?;
        artifact.verify_layout()?;

        let cleaned = clean_record(record, self.fallback_created_year);
        let features =
            ChannelFeatures::from_record(&cleaned, current_year, self.fallback_created_year);

        let vector = artifact.encoder.transform(&features);
        let data: Vec<f32> = vector.iter().map(|v| *v as f32).collect();
        let matrix = Matrix::from_vec(1, data.len(), data)
            .map_err(|e| EarncastError::Model(format!("Failed to assemble feature row: {}", e)))?;

        let predictions = artifact.regressor.predict(&matrix);
        let estimated = predictions
            .as_slice()
            .first()
            .copied()
            .map(f64::from)
            .ok_or_else(|| EarncastError::Model("Regressor returned no prediction".to_string()))?;

        Ok(EarningsEstimate {
            estimated_yearly_earnings: round2(estimated),
        })
    }

    /// Ranked importances from the installed artifact; empty when none is
    pub fn feature_importances(&self, limit: usize) -> Vec<(String, f64)> {
        match self.artifact() {
            Some(artifact) => artifact.feature_importances(limit),
            None => Vec::new(),
        }
    }

    /// Held-out metrics recorded when the installed artifact was trained
    pub fn accuracy(&self) -> Option<EvalMetrics> {
        self.artifact().map(|a| a.metrics.clone())
    }
}

/// Reject explicit non-finite numbers in the fields the cleaner treats as
/// numeric. Everything else recovers locally downstream.
fn check_finite(record: &RawRecord) -> Result<()> {
    let checked = NUMERIC_REQUEST_FIELDS
        .iter()
        .copied()
        .chain(std::iter::once("created_year"));
    for field in checked {
        if let Some(RawValue::Number(v)) = record.get(field) {
            if !v.is_finite() {
                return Err(EarncastError::BadInput {
                    column: field.to_string(),
                    reason: format!("non-finite value {}", v),
                });
            }
        }
    }
    Ok(())
}

/// Estimates are currency amounts; responses carry whole cents
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Format an estimate for display
pub fn format_estimate(estimate: &EarningsEstimate) -> String {
    format!(
        "Estimated yearly earnings: ${:.2}",
        estimate.estimated_yearly_earnings
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureEncoder;
    use crate::model::artifact::TrainingMeta;
    use aprender::primitives::Vector;
    use aprender::tree::RandomForestRegressor;
    use std::collections::BTreeMap;

    fn channel(subscribers: f64, category: &str) -> ChannelFeatures {
        ChannelFeatures {
            subscribers,
            video_views: subscribers * 50.0,
            uploads: 100.0,
            views_per_upload: subscribers / 2.0,
            subscribers_growth_rate: 0.0,
            video_views_growth_rate: 0.0,
            channel_age_years: 8.0,
            category: category.to_string(),
            country: "US".to_string(),
            channel_type: category.to_string(),
        }
    }

    /// Fits a forest on constant targets so every prediction is `target`
    fn artifact(target: f32) -> TrainedArtifact {
        let rows = vec![
            channel(1_000.0, "Music"),
            channel(5_000.0, "Music"),
            channel(20_000.0, "Gaming"),
            channel(80_000.0, "Gaming"),
        ];
        let encoder = FeatureEncoder::fit(&rows);
        let feature_names = encoder.feature_names();

        let width = encoder.width();
        let data: Vec<f32> = rows
            .iter()
            .flat_map(|r| encoder.transform(r))
            .map(|v| v as f32)
            .collect();
        let x = Matrix::from_vec(rows.len(), width, data).unwrap();
        let y = Vector::from_vec(vec![target; rows.len()]);

        let mut regressor = RandomForestRegressor::new(5).with_random_state(42);
        regressor.fit(&x, &y).unwrap();

        TrainedArtifact {
            encoder,
            medians: BTreeMap::new(),
            regressor,
            feature_names,
            metrics: EvalMetrics::new(12.5, 0.87, &[target], &[target]),
            meta: TrainingMeta {
                trained_at: Utc::now(),
                dataset_rows: 4,
                cleaned_rows: 4,
                train_rows: 4,
                target_column: "highest_yearly_earnings".to_string(),
                seed: 42,
            },
        }
    }

    fn request() -> RawRecord {
        let mut record = BTreeMap::new();
        record.insert("subscribers".to_string(), RawValue::Number(5_000.0));
        record.insert("video views".to_string(), RawValue::Number(250_000.0));
        record.insert("uploads".to_string(), RawValue::Number(120.0));
        record.insert("created_year".to_string(), RawValue::Number(2016.0));
        record.insert(
            "category".to_string(),
            RawValue::Text("Music".to_string()),
        );
        record.insert("Country".to_string(), RawValue::Text("US".to_string()));
        record.insert(
            "channel_type".to_string(),
            RawValue::Text("Music".to_string()),
        );
        record
    }

    #[test]
    fn test_not_ready_before_install() {
        let service = PredictionService::new(&Config::default());

        let err = service.predict_at(&request(), 2023).unwrap_err();
        assert!(matches!(err, EarncastError::NotReady));
        assert!(service.accuracy().is_none());
        assert!(service.feature_importances(10).is_empty());
    }

    #[test]
    fn test_predicts_after_install() {
        let service = PredictionService::new(&Config::default());
        service.install(artifact(500.0));

        let estimate = service.predict_at(&request(), 2023).unwrap();
        assert!((estimate.estimated_yearly_earnings - 500.0).abs() < 1e-3);
        assert!(service.accuracy().is_some());
    }

    #[test]
    fn test_install_swaps_atomically() {
        let service = PredictionService::new(&Config::default());
        service.install(artifact(500.0));

        let held = service.artifact().unwrap();

        service.install(artifact(2_000.0));
        let estimate = service.predict_at(&request(), 2023).unwrap();
        assert!((estimate.estimated_yearly_earnings - 2_000.0).abs() < 1e-3);

        // The artifact grabbed before the swap still answers as before
        assert!((held.metrics.rmse - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_loads_artifact_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        artifact(750.0).save(&path).unwrap();

        let service = PredictionService::new(&Config::default());
        service.load_from(&path).unwrap();

        let estimate = service.predict_at(&request(), 2023).unwrap();
        assert!((estimate.estimated_yearly_earnings - 750.0).abs() < 1e-3);
    }

    #[test]
    fn test_unseen_category_still_predicts() {
        let service = PredictionService::new(&Config::default());
        service.install(artifact(500.0));

        let mut record = request();
        record.insert(
            "category".to_string(),
            RawValue::Text("Cooking".to_string()),
        );

        let estimate = service.predict_at(&record, 2023).unwrap();
        assert!(estimate.estimated_yearly_earnings.is_finite());
    }

    #[test]
    fn test_sparse_request_still_predicts() {
        let service = PredictionService::new(&Config::default());
        service.install(artifact(500.0));

        let mut record = BTreeMap::new();
        record.insert(
            "subscribers".to_string(),
            RawValue::Text("1,000,000".to_string()),
        );

        let estimate = service.predict_at(&record, 2023).unwrap();
        assert!(estimate.estimated_yearly_earnings.is_finite());
    }

    #[test]
    fn test_non_finite_numeric_is_bad_input() {
        let service = PredictionService::new(&Config::default());
        service.install(artifact(500.0));

        let mut record = request();
        record.insert("subscribers".to_string(), RawValue::Number(f64::NAN));

        let err = service.predict_at(&record, 2023).unwrap_err();
        match err {
            EarncastError::BadInput { column, .. } => assert_eq!(column, "subscribers"),
            other => panic!("expected BadInput, got {:?}", other),
        }
    }

    #[test]
    fn test_estimate_rounds_to_cents() {
        let service = PredictionService::new(&Config::default());
        service.install(artifact(1234.5678));

        let estimate = service.predict_at(&request(), 2023).unwrap();
        assert_eq!(estimate.estimated_yearly_earnings, 1234.57);
    }

    #[test]
    fn test_format_estimate() {
        let estimate = EarningsEstimate {
            estimated_yearly_earnings: 12345.678,
        };
        assert_eq!(
            format_estimate(&estimate),
            "Estimated yearly earnings: $12345.68"
        );
    }
}
