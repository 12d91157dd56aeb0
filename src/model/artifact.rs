//! The persisted training artifact
//!
//! Everything inference needs travels in one serde blob: the fitted encoder,
//! frozen imputation medians, the fitted regressor, the bound feature-name
//! order, held-out metrics and training metadata. A loaded artifact stands
//! alone; nothing in it references the process that created it.

use crate::features::FeatureEncoder;
use crate::training::EvalMetrics;
use crate::{EarncastError, Result};
use aprender::tree::RandomForestRegressor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata recorded at training time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMeta {
    pub trained_at: DateTime<Utc>,
    /// Rows in the raw snapshot
    pub dataset_rows: usize,
    /// Rows surviving the cleaner's filters
    pub cleaned_rows: usize,
    /// Rows in the training partition
    pub train_rows: usize,
    /// The target column the run actually trained on
    pub target_column: String,
    pub seed: u64,
}

/// Immutable bundle produced by one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    /// Fitted categorical vocabularies
    pub encoder: FeatureEncoder,
    /// Numeric imputation medians, frozen at cleaning time
    pub medians: BTreeMap<String, f64>,
    /// Fitted regressor
    pub regressor: RandomForestRegressor,
    /// Output feature names, permanently bound to the regressor's input order
    pub feature_names: Vec<String>,
    /// Held-out evaluation metrics
    pub metrics: EvalMetrics,
    pub meta: TrainingMeta,
}

impl TrainedArtifact {
    /// Save as a self-contained JSON blob
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved artifact to {}", path.display());
        Ok(())
    }

    /// Load an artifact written by any earlier run
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EarncastError::Model(format!("Failed to read artifact {}: {}", path.display(), e))
        })?;
        let artifact: TrainedArtifact = serde_json::from_str(&json)?;
        artifact.verify_layout()?;
        log::info!(
            "Loaded artifact from {} ({} features)",
            path.display(),
            artifact.feature_names.len()
        );
        Ok(artifact)
    }

    /// Check the stored name list against the encoder's layout.
    ///
    /// The two are written together at training time; a divergence means the
    /// blob was edited or corrupted, and predicting against it would
    /// silently misalign columns.
    pub fn verify_layout(&self) -> Result<()> {
        let derived = self.encoder.feature_names();
        for (i, stored) in self.feature_names.iter().enumerate() {
            match derived.get(i) {
                Some(name) if name == stored => {}
                Some(name) => {
                    return Err(EarncastError::BadInput {
                        column: stored.clone(),
                        reason: format!("encoder layout has `{}` at position {}", name, i),
                    });
                }
                None => {
                    return Err(EarncastError::BadInput {
                        column: stored.clone(),
                        reason: "not produced by the encoder layout".to_string(),
                    });
                }
            }
        }
        if derived.len() > self.feature_names.len() {
            return Err(EarncastError::BadInput {
                column: derived[self.feature_names.len()].clone(),
                reason: "missing from the stored feature list".to_string(),
            });
        }
        Ok(())
    }

    /// Ranked feature importances, highest first, at most `limit` entries,
    /// scores rounded to four decimals.
    ///
    /// A regressor that cannot decompose importances yields an empty list.
    pub fn feature_importances(&self, limit: usize) -> Vec<(String, f64)> {
        let Some(scores) = self.regressor.feature_importances() else {
            return Vec::new();
        };

        let mut ranked: Vec<(String, f32)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(scores.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);
        ranked
            .into_iter()
            .map(|(name, score)| (name, round4(f64::from(score))))
            .collect()
    }

    /// One line per categorical field for display
    pub fn vocabulary_summary(&self) -> Vec<String> {
        self.encoder
            .vocabularies()
            .iter()
            .map(|v| format!("{} ({} values)", v.field, v.values.len()))
            .collect()
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
