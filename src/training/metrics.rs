//! Evaluation metrics for a trained model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of (actual, predicted) pairs retained for display
pub const MAX_SAMPLE_PAIRS: usize = 20;

/// Held-out evaluation metrics, frozen into the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Root-mean-squared error over the test partition
    pub rmse: f64,
    /// Coefficient of determination over the test partition
    pub r2: f64,
    /// Test partition size
    pub test_rows: usize,
    /// Leading (actual, predicted) pairs from the test partition
    pub samples: Vec<(f64, f64)>,
}

impl EvalMetrics {
    pub fn new(rmse: f64, r2: f64, actual: &[f32], predicted: &[f32]) -> Self {
        let samples = actual
            .iter()
            .zip(predicted.iter())
            .take(MAX_SAMPLE_PAIRS)
            .map(|(a, p)| (f64::from(*a), f64::from(*p)))
            .collect();

        EvalMetrics {
            rmse,
            r2,
            test_rows: actual.len(),
            samples,
        }
    }
}

impl fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE: {:.2} | R²: {:.4} | test rows: {}",
            self.rmse, self.r2, self.test_rows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_capped() {
        let actual: Vec<f32> = (0..30).map(|i| i as f32).collect();
        let predicted: Vec<f32> = (0..30).map(|i| i as f32 + 0.5).collect();

        let metrics = EvalMetrics::new(0.5, 0.99, &actual, &predicted);
        assert_eq!(metrics.samples.len(), MAX_SAMPLE_PAIRS);
        assert_eq!(metrics.test_rows, 30);
        assert_eq!(metrics.samples[0], (0.0, 0.5));
    }
}
