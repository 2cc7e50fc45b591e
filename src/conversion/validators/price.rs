use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldValidator, SemanticType, ValidationResult};
use crate::domain::{Pricing, PricingType};

static FREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:free|no\s+cost|no\s+charge|complimentary|gratis)\b").unwrap()
});

static DONATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)donation|pay\s+what\s+you|pay-what-you|sliding\s+scale|suggested").unwrap()
});

static DOLLAR_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d+)(\.\d{1,2})?").unwrap());

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct PriceAssessment {
    pub result: ValidationResult,
    pub pricing: Pricing,
}

/// Classifies price text as free, paid, donation or variable
pub struct PriceValidator;

impl PriceValidator {
    pub fn assess(&self, value: &str) -> PriceAssessment {
        let raw = value.trim();
        let amounts = dollar_amounts(raw);
        let nonzero: Vec<f64> = amounts.iter().copied().filter(|a| *a > 0.0).collect();
        let says_free = FREE.is_match(raw);

        if says_free && !nonzero.is_empty() {
            // "Free for members, $10 guests"
            return variable(raw, 0.6, "Mixes free and paid pricing");
        }
        if says_free || (!amounts.is_empty() && nonzero.is_empty()) {
            return assessment(PricingType::Free, Some(0.0), None, 1.0, None);
        }
        if DONATION.is_match(raw) {
            let cost = nonzero.first().copied();
            return assessment(PricingType::Donation, cost, Some(raw), 0.9, None);
        }
        if let Some(min) = nonzero.iter().copied().reduce(f64::min) {
            let distinct = nonzero.iter().any(|a| (a - min).abs() > f64::EPSILON);
            return if distinct {
                assessment(
                    PricingType::Paid,
                    Some(min),
                    Some(raw),
                    0.85,
                    Some("Several prices listed; using the lowest"),
                )
            } else {
                assessment(PricingType::Paid, Some(min), None, 1.0, None)
            };
        }
        if BARE_NUMBER.is_match(raw) {
            if let Ok(cost) = raw.parse::<f64>() {
                return if cost == 0.0 {
                    assessment(PricingType::Free, Some(0.0), None, 1.0, None)
                } else {
                    assessment(PricingType::Paid, Some(cost), None, 0.9, None)
                };
            }
        }
        variable(raw, 0.5, "Unrecognized price text kept as description")
    }
}

impl FieldValidator for PriceValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Price
    }

    fn validate(&self, value: &str) -> ValidationResult {
        self.assess(value).result
    }
}

fn dollar_amounts(text: &str) -> Vec<f64> {
    DOLLAR_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps[1].replace(',', "");
            let cents = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            format!("{}{}", whole, cents).parse().ok()
        })
        .collect()
}

fn variable(raw: &str, confidence: f64, reason: &str) -> PriceAssessment {
    assessment(PricingType::Variable, None, Some(raw), confidence, Some(reason))
}

fn assessment(
    pricing_type: PricingType,
    cost: Option<f64>,
    description: Option<&str>,
    confidence: f64,
    reason: Option<&str>,
) -> PriceAssessment {
    let normalized = match (pricing_type, cost) {
        (PricingType::Paid, Some(cost)) => format!("paid:{:.2}", cost),
        _ => pricing_type.as_str().to_string(),
    };
    let result = match reason {
        Some(reason) => ValidationResult::flagged(normalized, confidence, reason),
        None => ValidationResult::accept(normalized, confidence),
    };
    PriceAssessment {
        result,
        pricing: Pricing {
            pricing_type,
            cost,
            description: description.map(str::to_string),
        },
    }
}
