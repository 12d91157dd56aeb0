//! Trained model artifact
//!
//! The immutable bundle a training run produces and the prediction service
//! consumes.

pub mod artifact;

pub use artifact::TrainedArtifact;
