use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldValidator, SemanticType, ValidationResult};

static ABSOLUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9-]+)+(?::\d+)?(?:[/?#]\S*)?$").unwrap());

static BARE_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^www\.[a-z0-9-]+(?:\.[a-z0-9-]+)+(?:[/?#]\S*)?$").unwrap());

/// Registration links must be absolute http(s) URLs
pub struct UrlValidator;

impl FieldValidator for UrlValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Url
    }

    fn validate(&self, value: &str) -> ValidationResult {
        let trimmed = value.trim();
        if ABSOLUTE.is_match(trimmed) {
            return ValidationResult::accept(trimmed, 1.0);
        }
        if BARE_HOST.is_match(trimmed) {
            return ValidationResult::flagged(format!("https://{}", trimmed), 0.8, "Scheme missing; assumed https");
        }
        ValidationResult::reject(format!("Not an absolute URL: '{}'", trimmed))
    }
}
