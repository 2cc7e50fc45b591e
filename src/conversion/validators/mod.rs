//! Plausibility checks for single extracted values, one validator per semantic type.
//!
//! Validators never fail a record on their own. They return a verdict, a
//! confidence and a normalized value; the builder decides what an invalid or
//! low-confidence verdict means for the activity.

pub mod age_range;
pub mod date;
pub mod location;
pub mod price;
pub mod time;
pub mod title;
pub mod url;

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;

pub use age_range::{AgeAssessment, AgeRangeValidator};
pub use date::{DateAssessment, DateValidator, DateWindow};
pub use location::LocationValidator;
pub use price::{PriceAssessment, PriceValidator};
pub use time::TimeValidator;
pub use title::TitleValidator;
pub use url::UrlValidator;

/// Below this a valid value is kept but flagged for review
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    /// 0.0 to 1.0
    pub confidence: f64,
    /// Canonical form of the value; empty when invalid
    pub normalized_value: String,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn accept(normalized_value: impl Into<String>, confidence: f64) -> Self {
        Self {
            valid: true,
            confidence,
            normalized_value: normalized_value.into(),
            reason: None,
        }
    }

    /// Valid, but with a note explaining the reduced confidence
    pub fn flagged(normalized_value: impl Into<String>, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            confidence,
            normalized_value: normalized_value.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            confidence: 0.0,
            normalized_value: String::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.valid && self.confidence < LOW_CONFIDENCE_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Date,
    Time,
    Title,
    Price,
    Location,
    AgeRange,
    Url,
}

pub trait FieldValidator: Send + Sync {
    fn semantic_type(&self) -> SemanticType;

    fn validate(&self, value: &str) -> ValidationResult;
}

/// The full validator set for one conversion run
pub struct Validators {
    pub date: DateValidator,
    pub time: TimeValidator,
    pub title: TitleValidator,
    pub location: LocationValidator,
    pub price: PriceValidator,
    pub age_range: AgeRangeValidator,
    pub url: UrlValidator,
}

impl Validators {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            date: DateValidator::new(config.today(), config.max_past_days, config.max_future_days),
            time: TimeValidator,
            title: TitleValidator::new(config.title_min_len, config.title_max_len),
            location: LocationValidator,
            price: PriceValidator,
            age_range: AgeRangeValidator,
            url: UrlValidator,
        }
    }

    pub fn for_type(&self, semantic_type: SemanticType) -> &dyn FieldValidator {
        match semantic_type {
            SemanticType::Date => &self.date,
            SemanticType::Time => &self.time,
            SemanticType::Title => &self.title,
            SemanticType::Price => &self.price,
            SemanticType::Location => &self.location,
            SemanticType::AgeRange => &self.age_range,
            SemanticType::Url => &self.url,
        }
    }

    pub fn validate(&self, semantic_type: SemanticType, value: &str) -> ValidationResult {
        self.for_type(semantic_type).validate(value)
    }
}
