//! Categorical encoding and feature-vector assembly
//!
//! The encoder owns the full vector layout: the numeric block in declaration
//! order, then one indicator block per categorical field in vocabulary
//! order. Fitting freezes the vocabularies; transform reproduces the exact
//! layout for any record, mapping unseen values to an all-zero block.

use crate::features::ChannelFeatures;
use serde::{Deserialize, Serialize};

/// Vocabulary for one categorical field, sorted and frozen at fit time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldVocabulary {
    pub field: String,
    pub values: Vec<String>,
}

/// Fitted encoder state: one vocabulary per categorical field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    vocabularies: Vec<FieldVocabulary>,
}

impl FeatureEncoder {
    /// Learn vocabularies from the training partition
    pub fn fit(records: &[ChannelFeatures]) -> Self {
        let vocabularies = ChannelFeatures::CATEGORICAL_FIELDS
            .iter()
            .enumerate()
            .map(|(block, field)| {
                let mut values: Vec<String> = records
                    .iter()
                    .map(|r| r.categorical_values()[block].to_string())
                    .collect();
                values.sort();
                values.dedup();
                FieldVocabulary {
                    field: field.to_string(),
                    values,
                }
            })
            .collect();

        FeatureEncoder { vocabularies }
    }

    /// Full vector width: numeric block plus every indicator block
    pub fn width(&self) -> usize {
        ChannelFeatures::NUMERIC_DIM
            + self
                .vocabularies
                .iter()
                .map(|v| v.values.len())
                .sum::<usize>()
    }

    /// Output feature names, in exact vector order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ChannelFeatures::NUMERIC_NAMES
            .iter()
            .map(|n| n.to_string())
            .collect();
        for vocab in &self.vocabularies {
            for value in &vocab.values {
                names.push(format!("{}={}", vocab.field, value));
            }
        }
        names
    }

    /// Encode one record into the frozen layout.
    ///
    /// Unseen categorical values produce an all-zero indicator block; the
    /// width never changes and no new column is introduced.
    pub fn transform(&self, features: &ChannelFeatures) -> Vec<f64> {
        let mut vector = Vec::with_capacity(self.width());
        vector.extend(features.numeric_vec());
        for (vocab, value) in self.vocabularies.iter().zip(features.categorical_values()) {
            for known in &vocab.values {
                vector.push(if known.as_str() == value { 1.0 } else { 0.0 });
            }
        }
        vector
    }

    pub fn vocabularies(&self) -> &[FieldVocabulary] {
        &self.vocabularies
    }
}
