use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldValidator, SemanticType, ValidationResult};

pub const ALL_AGES: &str = "all-ages";

/// Age buckets in display order with their inclusive year bounds
const BUCKETS: [(&str, u32, u32); 6] = [
    ("infant", 0, 0),
    ("toddler", 1, 2),
    ("preschool", 3, 5),
    ("school-age", 6, 12),
    ("teen", 13, 17),
    ("adult", 18, 120),
];

static NAMED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\ball[\s-]ages\b|\beveryone\b|\bfamil(?:y|ies)\b", ALL_AGES),
        (r"\binfants?\b|\bbab(?:y|ies)\b|\bnewborns?\b", "infant"),
        (r"\btoddlers?\b", "toddler"),
        (r"\bpre-?school(?:ers)?\b|\bpre-?k\b", "preschool"),
        (r"\bschool[\s-]age\b|\belementary\b|\bkids\b|\bchild(?:ren)?\b|\btweens?\b", "school-age"),
        (r"\bteens?\b|\bteenagers?\b|\byouth\b", "teen"),
        (r"\badults?\b|\bgrown[\s-]?ups?\b", "adult"),
    ]
    .into_iter()
    .map(|(pattern, tag)| (Regex::new(pattern).unwrap(), tag))
    .collect()
});

static RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3})\s*(?:-|–|to)\s*(\d{1,3})\s*(months?|mos?\b)?").unwrap());

static AND_UP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\s*(?:\+|(?:yrs?|years?)?\s*(?:and|&)\s*(?:up|older|over))").unwrap());

static UNDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:under|younger\s+than|below)\s*(\d{1,2})").unwrap());

static SINGLE_AGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bages?\s*(\d{1,2})\b|\b(\d{1,2})\s*(?:yrs?|years?)(?:\s*old)?\b").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct AgeAssessment {
    pub result: ValidationResult,
    pub groups: Vec<String>,
}

/// Turns free-form audience text into age-group tags
pub struct AgeRangeValidator;

impl AgeRangeValidator {
    pub fn assess(&self, value: &str) -> AgeAssessment {
        let raw = value.trim();
        let text = raw.to_lowercase();
        let mut matched = [false; BUCKETS.len()];
        let mut all_ages = false;

        let numeric = numeric_bounds(&text);
        if let Some((low, high)) = numeric {
            for (index, (_, bucket_low, bucket_high)) in BUCKETS.iter().enumerate() {
                if low <= *bucket_high && high >= *bucket_low {
                    matched[index] = true;
                }
            }
        }

        for (pattern, tag) in NAMED.iter() {
            // Explicit numbers win over words like "kids"
            if !pattern.is_match(&text) || (numeric.is_some() && *tag != ALL_AGES) {
                continue;
            }
            if *tag == ALL_AGES {
                all_ages = true;
            } else if let Some(index) = BUCKETS.iter().position(|(name, _, _)| name == tag) {
                matched[index] = true;
            }
        }

        let mut groups: Vec<String> = Vec::new();
        if all_ages {
            groups.push(ALL_AGES.to_string());
        }
        groups.extend(
            BUCKETS
                .iter()
                .zip(matched)
                .filter(|(_, hit)| *hit)
                .map(|((name, _, _), _)| name.to_string()),
        );

        if groups.is_empty() {
            if raw.is_empty() {
                return AgeAssessment {
                    result: ValidationResult::reject("Age range is empty"),
                    groups,
                };
            }
            return AgeAssessment {
                result: ValidationResult::flagged(raw, 0.4, "Unrecognized age range kept as a free-text tag"),
                groups: vec![raw.to_string()],
            };
        }

        let confidence = if numeric.is_some() { 1.0 } else { 0.9 };
        AgeAssessment {
            result: ValidationResult::accept(groups.join(","), confidence),
            groups,
        }
    }
}

impl FieldValidator for AgeRangeValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::AgeRange
    }

    fn validate(&self, value: &str) -> ValidationResult {
        self.assess(value).result
    }
}

/// Inclusive age bounds in years from the first numeric pattern found
fn numeric_bounds(text: &str) -> Option<(u32, u32)> {
    if let Some(caps) = RANGE.captures(text) {
        let mut low: u32 = caps[1].parse().ok()?;
        let mut high: u32 = caps[2].parse().ok()?;
        if caps.get(3).is_some() {
            // "18-36 months" ends before the third birthday
            low /= 12;
            high = high.saturating_sub(1) / 12;
        }
        return (low <= high).then_some((low, high));
    }
    if let Some(caps) = AND_UP.captures(text) {
        return Some((caps[1].parse().ok()?, 120));
    }
    if let Some(caps) = UNDER.captures(text) {
        let limit: u32 = caps[1].parse().ok()?;
        return Some((0, limit.saturating_sub(1)));
    }
    if let Some(caps) = SINGLE_AGE.captures(text) {
        let age: u32 = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
        return Some((age, age));
    }
    None
}
