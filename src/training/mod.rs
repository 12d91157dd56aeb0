//! Model training
//!
//! Target construction, the seeded split, regressor fitting and evaluation.

pub mod metrics;
pub mod trainer;

pub use metrics::EvalMetrics;
pub use trainer::{train, TrainingReport};
