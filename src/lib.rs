//! Creator earnings estimation from channel statistics
//!
//! A feature pipeline and tree-ensemble regressor for estimating a channel's
//! yearly earnings, with train/serve parity between bulk training and
//! single-record inference.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A loosely-typed value as read from a dataset cell or a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl RawValue {
    /// Numeric view of the value: numbers pass through, text parses if it can
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            RawValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }
}

/// A raw dataset row or prediction request: column name to value, no schema
/// guarantee. Any field may be absent or wrongly typed.
pub type RawRecord = BTreeMap<String, RawValue>;

/// A cell value after cleaning: imputation and coercion leave no gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CleanValue {
    Number(f64),
    Text(String),
}

impl CleanValue {
    /// Numeric view; `None` for categorical cells (coercion already ran)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CleanValue::Number(n) => Some(*n),
            CleanValue::Text(_) => None,
        }
    }
}

/// A record after column pruning, imputation and coercion
pub type CleanedRecord = BTreeMap<String, CleanValue>;

/// Point estimate returned by the prediction service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsEstimate {
    pub estimated_yearly_earnings: f64,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum EarncastError {
    #[error("No trained model - run `earncast train` first")]
    NotReady,

    #[error("Cannot build training target: {0}")]
    MissingTarget(String),

    #[error("Bad input for `{column}`: {reason}")]
    BadInput { column: String, reason: String },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EarncastError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub dataset_path: String,
    pub artifact_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_size: f32,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub top_importances: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub fallback_created_year: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                dataset_path: "data/youtube_channels.csv".to_string(),
                artifact_path: "model/earnings_artifact.json".to_string(),
            },
            training: TrainingConfig {
                test_size: 0.2,
                seed: 42,
                n_estimators: 100,
                max_depth: None,
                top_importances: 10,
            },
            inference: InferenceConfig {
                fallback_created_year: 2015,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EarncastError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| EarncastError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EarncastError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
