//! Feature engineering and encoding
//!
//! Converts cleaned channel records into model-ready feature vectors.

pub mod encoding;
pub mod engineering;

pub use encoding::FeatureEncoder;
pub use engineering::{earnings_per_subscriber, safe_div, ChannelFeatures};
