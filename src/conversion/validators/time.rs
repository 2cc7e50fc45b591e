use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldValidator, SemanticType, ValidationResult};

static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?::(\d{2}))?\s*(?:([ap])\.?\s*m\.?)?$").unwrap()
});

/// Leading words venues put in front of a time, e.g. "Doors: 7:00 PM"
static PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?:doors|starts?|begins?|from)\b\s*)?(?:at\b\s*)?:?\s*").unwrap());

static RANGE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:-|–|—|\bto\b|\buntil\b)\s*").unwrap());

static MERIDIEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"([ap])\.?\s*m\.?$").unwrap());

/// Accepts 24-hour, 12-hour with AM/PM and bare-hour times; normalizes to `HH:MM`
pub struct TimeValidator;

impl TimeValidator {
    /// Split "2:00 PM - 4:00 PM" or "2-4pm" into start and end.
    /// A start without AM/PM borrows the end's.
    pub fn split_range(&self, value: &str) -> Option<(String, String)> {
        let cleaned = value.trim().to_lowercase();
        let mut parts = RANGE_SEPARATOR.splitn(&cleaned, 2);
        let start = parts.next()?.trim();
        let end = parts.next()?.trim();
        if start.is_empty() || end.is_empty() {
            return None;
        }

        let start = match (MERIDIEM.is_match(start), MERIDIEM.captures(end)) {
            (false, Some(caps)) if !start.contains("noon") && !start.contains("midnight") => {
                format!("{} {}m", start, &caps[1])
            }
            _ => start.to_string(),
        };
        Some((start, end.to_string()))
    }
}

impl FieldValidator for TimeValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Time
    }

    fn validate(&self, value: &str) -> ValidationResult {
        let lowered = value.trim().to_lowercase();
        let cleaned = PREFIX.replace(&lowered, "");
        let cleaned = cleaned.trim();

        match cleaned {
            "noon" => return ValidationResult::accept("12:00", 1.0),
            "midnight" => return ValidationResult::accept("00:00", 1.0),
            _ => {}
        }

        let Some(caps) = TIME.captures(cleaned) else {
            return ValidationResult::reject(format!("Unrecognized time format: '{}'", value.trim()));
        };

        let Ok(mut hour) = caps[1].parse::<u32>() else {
            return ValidationResult::reject("Hour is not a number");
        };
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let second: u32 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        if minute > 59 || second > 59 {
            return ValidationResult::reject(format!("Minute out of range in '{}'", value.trim()));
        }

        match caps.get(4).map(|m| m.as_str()) {
            Some(meridiem) => {
                if hour == 0 || hour > 12 {
                    return ValidationResult::reject(format!(
                        "Hour {} out of range for a 12-hour time",
                        hour
                    ));
                }
                hour %= 12;
                if meridiem == "p" {
                    hour += 12;
                }
            }
            None if hour > 23 => {
                return ValidationResult::reject(format!("Hour {} out of range", hour));
            }
            None => {}
        }

        let normalized = format!("{:02}:{:02}", hour, minute);
        if caps.get(2).is_none() && caps.get(4).is_none() {
            ValidationResult::flagged(normalized, 0.7, "Bare hour without AM/PM")
        } else {
            ValidationResult::accept(normalized, 1.0)
        }
    }
}
