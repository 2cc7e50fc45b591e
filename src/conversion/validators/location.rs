use super::{FieldValidator, SemanticType, ValidationResult};
use crate::conversion::text::clean_text;

const PLACEHOLDER_NAMES: [&str; 6] = ["tbd", "tba", "to be announced", "to be determined", "various", "n/a"];

/// A location needs a name; the address is optional but raises confidence
pub struct LocationValidator;

impl LocationValidator {
    pub fn assess(&self, name: Option<&str>, address: Option<&str>) -> ValidationResult {
        let name = name.map(clean_text).unwrap_or_default();
        if name.is_empty() {
            return ValidationResult::reject("Location name is missing");
        }

        let lowered = name.to_lowercase();
        if PLACEHOLDER_NAMES.contains(&lowered.trim_end_matches('.')) {
            return ValidationResult::flagged(name, 0.5, "Location name is a placeholder");
        }

        let has_address = address.map(|a| !a.trim().is_empty()).unwrap_or(false);
        if has_address {
            ValidationResult::accept(name, 1.0)
        } else {
            ValidationResult::flagged(name, 0.9, "No street address")
        }
    }
}

impl FieldValidator for LocationValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Location
    }

    fn validate(&self, value: &str) -> ValidationResult {
        self.assess(Some(value), None)
    }
}
