use super::{FieldValidator, SemanticType, ValidationResult};
use crate::conversion::text::clean_text;

/// Titles must be between `min_len` and `max_len` characters after cleanup.
/// Anything non-empty is still usable; only an empty title is a hard failure.
pub struct TitleValidator {
    min_len: usize,
    max_len: usize,
}

impl TitleValidator {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }
}

impl FieldValidator for TitleValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Title
    }

    fn validate(&self, value: &str) -> ValidationResult {
        let cleaned = clean_text(value);
        let length = cleaned.chars().count();

        if length == 0 {
            return ValidationResult::reject("Title is empty");
        }

        let reason = if length < self.min_len {
            Some((0.3, format!("Title has only {} characters, likely truncated", length)))
        } else if length > self.max_len {
            Some((
                0.4,
                format!("Title has {} characters, likely a mis-mapped description", length),
            ))
        } else if !cleaned.chars().any(char::is_alphabetic) {
            Some((0.3, "Title contains no letters".to_string()))
        } else {
            None
        };

        match reason {
            Some((confidence, reason)) => ValidationResult {
                valid: false,
                confidence,
                normalized_value: cleaned,
                reason: Some(reason),
            },
            None => ValidationResult::accept(cleaned, 1.0),
        }
    }
}
