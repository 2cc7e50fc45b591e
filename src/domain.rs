use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_TIMEZONE;

/// Untyped key-value data for one scraped item, exactly as the extraction
/// service returned it.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Canonical family-activity listing produced from one raw record.
///
/// Only ever constructed with a non-empty `title` and `location.name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Location,
    pub schedule: Schedule,
    pub pricing: Option<Pricing>,
    pub age_groups: Vec<String>,
    #[serde(rename = "registrationURL")]
    pub registration_url: Option<String>,
    pub tags: Vec<String>,
}

impl Activity {
    /// Deterministic id so re-converting the same listing yields the same identity
    pub fn derive_id(title: &str, location_name: &str, start_date: Option<NaiveDate>) -> Uuid {
        let date = start_date.map(|d| d.to_string()).unwrap_or_default();
        let key = format!(
            "{}|{}|{}",
            title.trim().to_lowercase(),
            location_name.trim().to_lowercase(),
            date
        );
        Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub timezone: String,
    pub all_day: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            start_date: None,
            start_time: None,
            end_time: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            all_day: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    #[serde(rename = "type")]
    pub pricing_type: PricingType,
    pub cost: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    Free,
    Paid,
    Donation,
    Variable,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::Free => "free",
            PricingType::Paid => "paid",
            PricingType::Donation => "donation",
            PricingType::Variable => "variable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_id_is_stable_and_case_insensitive() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 15);
        let a = Activity::derive_id("Kids Art Workshop", "Seattle Community Center", date);
        let b = Activity::derive_id("kids art workshop ", "SEATTLE COMMUNITY CENTER", date);
        assert_eq!(a, b);

        let other_day = Activity::derive_id(
            "Kids Art Workshop",
            "Seattle Community Center",
            NaiveDate::from_ymd_opt(2024, 12, 16),
        );
        assert_ne!(a, other_day);
    }

    #[test]
    fn test_activity_serializes_camel_case() {
        let activity = Activity {
            id: Uuid::nil(),
            title: "Story Time".to_string(),
            description: None,
            location: Location {
                name: "Ballard Library".to_string(),
                address: None,
            },
            schedule: Schedule {
                start_date: NaiveDate::from_ymd_opt(2024, 12, 15),
                ..Schedule::default()
            },
            pricing: Some(Pricing {
                pricing_type: PricingType::Free,
                cost: Some(0.0),
                description: None,
            }),
            age_groups: vec!["preschool".to_string()],
            registration_url: Some("https://example.org/register".to_string()),
            tags: vec![],
        };

        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["schedule"]["startDate"], json!("2024-12-15"));
        assert_eq!(value["schedule"]["timezone"], json!("America/Los_Angeles"));
        assert_eq!(value["pricing"]["type"], json!("free"));
        assert_eq!(value["ageGroups"], json!(["preschool"]));
        assert_eq!(value["registrationURL"], json!("https://example.org/register"));
    }
}
