use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldValidator, SemanticType, ValidationResult};

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:$|[Tt\s])").unwrap());

static US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})(?:$|[\s,Tt])").unwrap());

static WEEKDAY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)[a-z]*\.?,?\s+").unwrap()
});

static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4})\b)?").unwrap()
});

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]{3,9})\.?(?:,?\s+(\d{4})\b)?").unwrap()
});

/// Time of day trailing a date, e.g. the `10:00` in `2024-12-15T10:00:00`
static EMBEDDED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:T|\s|,\s*|at\s+)(\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]\.?\s*m\.?)?|\d{1,2}\s*[ap]\.?\s*m\.?)")
        .unwrap()
});

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Where a parsed date falls relative to the reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Expected,
    FarPast,
    FarFuture,
    /// No year in the source; resolved to the next occurrence
    YearInferred,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateAssessment {
    pub result: ValidationResult,
    pub date: Option<NaiveDate>,
    pub window: Option<DateWindow>,
}

/// Accepts ISO, US slash and long-form English dates and normalizes to ISO
pub struct DateValidator {
    today: NaiveDate,
    max_past_days: i64,
    max_future_days: i64,
}

impl DateValidator {
    pub fn new(today: NaiveDate, max_past_days: i64, max_future_days: i64) -> Self {
        Self {
            today,
            max_past_days,
            max_future_days,
        }
    }

    pub fn assess(&self, value: &str) -> DateAssessment {
        let Some((date, year_inferred)) = self.parse(value) else {
            return DateAssessment {
                result: ValidationResult::reject(format!("Unrecognized date format: '{}'", value.trim())),
                date: None,
                window: None,
            };
        };

        let normalized = date.format("%Y-%m-%d").to_string();
        let days_ago = (self.today - date).num_days();

        let (result, window) = if days_ago > self.max_past_days {
            (
                ValidationResult::flagged(
                    normalized,
                    0.7,
                    format!("Date is {} days in the past", days_ago),
                ),
                DateWindow::FarPast,
            )
        } else if -days_ago > self.max_future_days {
            (
                ValidationResult::flagged(
                    normalized,
                    0.8,
                    format!("Date is {} days in the future", -days_ago),
                ),
                DateWindow::FarFuture,
            )
        } else if year_inferred {
            (
                ValidationResult::flagged(normalized, 0.7, "Year missing; assumed next occurrence"),
                DateWindow::YearInferred,
            )
        } else {
            (ValidationResult::accept(normalized, 1.0), DateWindow::Expected)
        };

        DateAssessment {
            result,
            date: Some(date),
            window: Some(window),
        }
    }

    /// Parse any supported format. The flag is true when the year was inferred.
    pub fn parse(&self, value: &str) -> Option<(NaiveDate, bool)> {
        let cleaned = value.trim().to_lowercase();
        if cleaned.is_empty() {
            return None;
        }

        if let Some(caps) = ISO_DATE.captures(&cleaned) {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day).map(|d| (d, false));
        }

        if let Some(caps) = US_DATE.captures(&cleaned) {
            let month = caps[1].parse().ok()?;
            let day = caps[2].parse().ok()?;
            let mut year: i32 = caps[3].parse().ok()?;
            if caps[3].len() == 2 {
                year += 2000;
            }
            return NaiveDate::from_ymd_opt(year, month, day).map(|d| (d, false));
        }

        let without_weekday = WEEKDAY_PREFIX.replace(&cleaned, "");
        let text = without_weekday.as_ref();

        if let Some(caps) = MONTH_FIRST.captures(text) {
            if let Some(month) = month_from_name(&caps[1]) {
                let day = caps[2].parse().ok()?;
                return self.resolve(caps.get(3).map(|m| m.as_str()), month, day);
            }
        }

        if let Some(caps) = DAY_FIRST.captures(text) {
            if let Some(month) = month_from_name(&caps[2]) {
                let day = caps[1].parse().ok()?;
                return self.resolve(caps.get(3).map(|m| m.as_str()), month, day);
            }
        }

        None
    }

    fn resolve(&self, year: Option<&str>, month: u32, day: u32) -> Option<(NaiveDate, bool)> {
        match year {
            Some(year) => NaiveDate::from_ymd_opt(year.parse().ok()?, month, day).map(|d| (d, false)),
            None => {
                let this_year = NaiveDate::from_ymd_opt(self.today.year(), month, day);
                match this_year {
                    Some(d) if d >= self.today => Some((d, true)),
                    _ => NaiveDate::from_ymd_opt(self.today.year() + 1, month, day).map(|d| (d, true)),
                }
            }
        }
    }
}

impl FieldValidator for DateValidator {
    fn semantic_type(&self) -> SemanticType {
        SemanticType::Date
    }

    fn validate(&self, value: &str) -> ValidationResult {
        self.assess(value).result
    }
}

/// Full names, three-letter abbreviations and prefixes like `sept` all resolve
fn month_from_name(name: &str) -> Option<u32> {
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|full| full.starts_with(name))
        .map(|index| index as u32 + 1)
}

/// The time-of-day part of a date-time string, if it carries one
pub fn embedded_time(value: &str) -> Option<String> {
    let trimmed = value.trim();
    // Only look past the date itself so "12/15/2024" is never read as a time.
    // The last date group is ASCII digits, so its end is a char boundary even
    // when a multi-byte space follows.
    let date_end = ISO_DATE
        .captures(trimmed)
        .or_else(|| US_DATE.captures(trimmed))
        .and_then(|caps| caps.get(3))
        .map(|m| m.end())
        .unwrap_or(0);
    EMBEDDED_TIME
        .captures(trimmed.get(date_end..)?)
        .map(|caps| caps[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> DateValidator {
        DateValidator::new(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(), 365, 730)
    }

    #[test]
    fn test_supported_formats_normalize_to_iso() {
        let v = validator();
        for input in [
            "2024-12-15",
            "12/15/2024",
            "12-15-2024",
            "12/15/24",
            "December 15, 2024",
            "Dec 15, 2024",
            "Sunday, December 15th, 2024",
            "15 December 2024",
            "2024-12-15T10:00:00",
            "2024-12-15T10:00:00-08:00",
        ] {
            let result = v.validate(input);
            assert!(result.valid, "{} should be valid", input);
            assert_eq!(result.normalized_value, "2024-12-15", "input {}", input);
        }
    }

    #[test]
    fn test_unparseable_date_is_rejected() {
        let v = validator();
        for input in ["not-a-date", "", "13/45/2024", "Smarch 3, 2024", "2024-02-30"] {
            let result = v.validate(input);
            assert!(!result.valid, "{} should be invalid", input);
            assert_eq!(result.confidence, 0.0);
            assert!(result.normalized_value.is_empty());
        }
    }

    #[test]
    fn test_far_past_date_is_kept_with_low_confidence() {
        let assessment = validator().assess("11/01/2023");
        assert!(assessment.result.valid);
        assert_eq!(assessment.window, Some(DateWindow::FarPast));
        assert!(assessment.result.is_low_confidence());
        assert_eq!(assessment.result.normalized_value, "2023-11-01");
    }

    #[test]
    fn test_far_future_date_is_flagged() {
        let assessment = validator().assess("2027-06-01");
        assert_eq!(assessment.window, Some(DateWindow::FarFuture));
        assert!(assessment.result.reason.is_some());
    }

    #[test]
    fn test_yearless_date_resolves_to_next_occurrence() {
        let v = validator();
        let upcoming = v.assess("Dec 15");
        assert_eq!(upcoming.result.normalized_value, "2024-12-15");
        assert_eq!(upcoming.window, Some(DateWindow::YearInferred));

        let next_year = v.assess("March 3rd");
        assert_eq!(next_year.result.normalized_value, "2025-03-03");
    }

    #[test]
    fn test_embedded_time() {
        assert_eq!(embedded_time("2024-12-15T10:30:00").as_deref(), Some("10:30:00"));
        assert_eq!(embedded_time("December 15, 2024 at 2pm").as_deref(), Some("2pm"));
        assert_eq!(embedded_time("12/15/2024 3:00 PM").as_deref(), Some("3:00 PM"));
        assert_eq!(embedded_time("12/15/2024"), None);
        assert_eq!(embedded_time("2024-12-15"), None);
    }

    #[test]
    fn test_embedded_time_after_unicode_space() {
        assert_eq!(embedded_time("2024-12-15\u{a0}10:00").as_deref(), Some("10:00"));
        assert_eq!(embedded_time("12/15/2024\u{202f}3:00 PM").as_deref(), Some("3:00 PM"));
        assert_eq!(embedded_time("12/15/24\u{2009}9am").as_deref(), Some("9am"));
        assert_eq!(embedded_time("2024-12-15\u{a0}"), None);
        assert_eq!(validator().validate("12/15/2024\u{202f}3:00 PM").normalized_value, "2024-12-15");
    }
}
