//! Prediction serving
//!
//! Load a trained artifact and serve single-record estimates.

pub mod service;

pub use service::PredictionService;
