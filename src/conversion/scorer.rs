use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::conversion::diagnostics::FieldMapping;

/// Aggregates per-field mapping and validation confidence into a 0-100 score.
///
/// Each scored field contributes `mapping confidence x validation confidence x weight`.
/// Absent optional fields still contribute `absent_optional_credit x weight`, so the
/// score tracks completeness without zeroing records that simply carry less data.
pub struct ConfidenceScorer<'c> {
    config: &'c ScoringConfig,
}

impl<'c> ConfidenceScorer<'c> {
    pub fn new(config: &'c ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, mappings: &BTreeMap<String, FieldMapping>) -> u8 {
        let mut total_weight = 0.0;
        let mut earned = 0.0;

        for (field, weight) in &self.config.weights {
            if *weight <= 0.0 {
                continue;
            }
            total_weight += weight;

            let contribution = match mappings.get(field) {
                Some(mapping) if !mapping.is_missing() => {
                    mapping.confidence * mapping.validation_confidence
                }
                _ if self.is_required(field) => 0.0,
                _ => self.config.absent_optional_credit,
            };
            earned += contribution.clamp(0.0, 1.0) * weight;
        }

        if total_weight <= 0.0 {
            return 0;
        }
        (earned / total_weight * 100.0).round().clamp(0.0, 100.0) as u8
    }

    fn is_required(&self, field: &str) -> bool {
        self.config.required_fields.iter().any(|f| f == field)
    }
}
