//! Data ingestion and cleaning
//!
//! CSV snapshot loading and the record cleaner that turns raw rows into
//! analysis-ready records.

pub mod cleaning;
pub mod loader;

pub use cleaning::{clean_dataset, clean_record, CleanedDataset};
pub use loader::Dataset;
