use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::*;
use crate::error::{ConverterError, Result};

/// Environment variable naming a TOML file to load instead of the defaults.
pub const CONFIG_ENV_VAR: &str = "ACTIVITY_CONVERTER_CONFIG";

/// Config file picked up from the working directory when no override is set.
pub const DEFAULT_CONFIG_PATH: &str = "converter.toml";

/// Schema-definition table and tuning knobs for one converter instance.
///
/// Every section is optional in TOML; anything left out keeps its default,
/// and field rules or weights given in the file replace only the fields they name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Keys tried, in order, when locating the record array in a payload
    pub container_keys: Vec<String>,
    /// Candidate source keys (and optional derivation) per activity field
    pub fields: BTreeMap<String, FieldRule>,
    pub mapping: MappingConfig,
    pub scoring: ScoringConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Acceptable source keys, most specific first. Dotted paths reach into nested objects.
    pub candidates: Vec<String>,
    #[serde(default)]
    pub derivation: Option<Derivation>,
}

/// Builds a value by joining whichever source keys are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub sources: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    ", ".to_string()
}

/// Confidence assigned to each kind of mapping decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub direct_confidence: f64,
    /// Confidence of the second candidate; later candidates step down from here
    pub fallback_confidence: f64,
    pub fallback_step: f64,
    pub fallback_floor: f64,
    pub derived_confidence: f64,
    pub default_confidence: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            direct_confidence: 0.9,
            fallback_confidence: 0.7,
            fallback_step: 0.05,
            fallback_floor: 0.6,
            derived_confidence: 0.5,
            default_confidence: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight per scored field. Fields not listed do not affect the score.
    pub weights: BTreeMap<String, f64>,
    /// Fields whose absence aborts the conversion
    pub required_fields: Vec<String>,
    /// Share of its weight an absent optional field still contributes
    pub absent_optional_credit: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let weights = [
            (FIELD_TITLE, 2.0),
            (FIELD_LOCATION, 2.0),
            (FIELD_DESCRIPTION, 1.0),
            (FIELD_START_DATE, 1.0),
            (FIELD_PRICING, 1.0),
            (FIELD_AGE_GROUPS, 1.0),
            (FIELD_REGISTRATION_URL, 1.0),
        ]
        .into_iter()
        .map(|(field, weight)| (field.to_string(), weight))
        .collect();

        Self {
            weights,
            required_fields: vec![FIELD_TITLE.to_string(), FIELD_LOCATION.to_string()],
            absent_optional_credit: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub title_min_len: usize,
    pub title_max_len: usize,
    /// Dates further back than this are kept but flagged
    pub max_past_days: i64,
    pub max_future_days: i64,
    pub default_timezone: String,
    /// Pins "today" for date plausibility checks; defaults to the current UTC date
    pub reference_date: Option<NaiveDate>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            title_min_len: 3,
            title_max_len: 200,
            max_past_days: 365,
            max_future_days: 730,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            reference_date: None,
        }
    }
}

impl ValidationConfig {
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

fn rule(candidates: &[&str]) -> FieldRule {
    FieldRule {
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
        derivation: None,
    }
}

fn derived_rule(candidates: &[&str], sources: &[&str], separator: &str) -> FieldRule {
    FieldRule {
        derivation: Some(Derivation {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            separator: separator.to_string(),
        }),
        ..rule(candidates)
    }
}

/// The built-in schema-definition table.
pub fn default_field_rules() -> BTreeMap<String, FieldRule> {
    let mut fields = BTreeMap::new();
    fields.insert(
        FIELD_TITLE.to_string(),
        derived_rule(
            &["title", "name", "event_title", "headline", "event_name", "activity_name", "class_name"],
            &["organizer", "event_type"],
            ": ",
        ),
    );
    fields.insert(
        FIELD_LOCATION.to_string(),
        derived_rule(
            &["location", "venue", "venue_name", "location_name", "place", "facility"],
            &["street_address", "address", "location.address", "venue.address", "city"],
            ", ",
        ),
    );
    fields.insert(
        FIELD_LOCATION_ADDRESS.to_string(),
        rule(&[
            "address",
            "location.address",
            "venue.address",
            "venue_address",
            "location_address",
            "street_address",
            "full_address",
        ]),
    );
    fields.insert(
        FIELD_DESCRIPTION.to_string(),
        rule(&["description", "summary", "details", "desc", "about", "body"]),
    );
    fields.insert(
        FIELD_START_DATE.to_string(),
        rule(&[
            "date",
            "start_date",
            "event_date",
            "startDate",
            "dates",
            "start",
            "start_datetime",
            "when",
        ]),
    );
    fields.insert(
        FIELD_START_TIME.to_string(),
        rule(&["start_time", "time", "startTime", "times", "hours", "begins"]),
    );
    fields.insert(FIELD_END_TIME.to_string(), rule(&["end_time", "endTime", "ends"]));
    fields.insert(FIELD_TIMEZONE.to_string(), rule(&["timezone", "time_zone", "tz"]));
    fields.insert(
        FIELD_PRICING.to_string(),
        rule(&["price", "cost", "pricing", "fee", "fees", "admission", "ticket_price"]),
    );
    fields.insert(
        FIELD_AGE_GROUPS.to_string(),
        rule(&["age_range", "ages", "age_group", "ageGroups", "age", "audience"]),
    );
    fields.insert(
        FIELD_REGISTRATION_URL.to_string(),
        rule(&[
            "registration_url",
            "registrationURL",
            "register_url",
            "signup_url",
            "ticket_url",
            "url",
            "link",
            "website",
        ]),
    );
    fields.insert(
        FIELD_TAGS.to_string(),
        rule(&["tags", "categories", "category", "keywords"]),
    );
    fields
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            container_keys: DEFAULT_CONTAINER_KEYS.iter().map(|k| k.to_string()).collect(),
            fields: default_field_rules(),
            mapping: MappingConfig::default(),
            scoring: ScoringConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ConverterConfig {
    /// Load a config file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConverterError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded converter config from {}", path.display());
        Ok(config)
    }

    /// Resolve the config the way the binary does: the env override first,
    /// then `converter.toml` in the working directory, then built-in defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(path),
            Err(std::env::VarError::NotPresent) => {
                if Path::new(DEFAULT_CONFIG_PATH).exists() {
                    Self::load(DEFAULT_CONFIG_PATH)
                } else {
                    debug!("No config file found, using built-in defaults");
                    Ok(Self::default())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ConverterConfig = toml::from_str(content)?;
        config.fill_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Restore defaults for any field rule or weight the file did not mention
    fn fill_defaults(&mut self) {
        for (field, rule) in default_field_rules() {
            self.fields.entry(field).or_insert(rule);
        }
        for (field, weight) in ScoringConfig::default().weights {
            self.scoring.weights.entry(field).or_insert(weight);
        }
        if self.container_keys.is_empty() {
            self.container_keys = DEFAULT_CONTAINER_KEYS.iter().map(|k| k.to_string()).collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let known = activity_fields();

        for (field, rule) in &self.fields {
            if !known.contains(&field.as_str()) {
                return Err(ConverterError::Config(format!(
                    "Unknown activity field '{}' in field rules",
                    field
                )));
            }
            if rule.candidates.is_empty() && rule.derivation.is_none() {
                return Err(ConverterError::Config(format!(
                    "Field '{}' has neither candidates nor a derivation",
                    field
                )));
            }
        }

        for field in self.scoring.weights.keys() {
            if !known.contains(&field.as_str()) {
                return Err(ConverterError::Config(format!(
                    "Unknown activity field '{}' in scoring weights",
                    field
                )));
            }
        }
        if self.scoring.weights.values().any(|w| *w < 0.0) {
            return Err(ConverterError::Config("Scoring weights must not be negative".to_string()));
        }
        for field in &self.scoring.required_fields {
            if field != FIELD_TITLE && field != FIELD_LOCATION {
                return Err(ConverterError::Config(format!(
                    "Only title and location can be required, got '{}'",
                    field
                )));
            }
        }

        let m = &self.mapping;
        let confidences = [
            m.direct_confidence,
            m.fallback_confidence,
            m.fallback_floor,
            m.derived_confidence,
            m.default_confidence,
            self.scoring.absent_optional_credit,
        ];
        if confidences.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConverterError::Config(
                "Confidences and credits must be between 0 and 1".to_string(),
            ));
        }

        let v = &self.validation;
        if v.title_min_len > v.title_max_len {
            return Err(ConverterError::Config(format!(
                "title_min_len ({}) exceeds title_max_len ({})",
                v.title_min_len, v.title_max_len
            )));
        }
        if v.max_past_days < 0 || v.max_future_days < 0 {
            return Err(ConverterError::Config("Date windows must not be negative".to_string()));
        }

        Ok(())
    }

    pub fn rule_for(&self, field: &str) -> Option<&FieldRule> {
        self.fields.get(field)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.scoring.required_fields.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConverterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.container_keys[0], "events");
        assert_eq!(config.rule_for(FIELD_TITLE).unwrap().candidates[0], "title");
        assert!(config.is_required(FIELD_TITLE));
        assert!(!config.is_required(FIELD_PRICING));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            container_keys = ["listings"]

            [fields.title]
            candidates = ["program_name", "title"]

            [validation]
            reference_date = "2024-12-01"
        "#;

        let config = ConverterConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.container_keys, vec!["listings".to_string()]);
        assert_eq!(config.rule_for(FIELD_TITLE).unwrap().candidates[0], "program_name");
        assert!(config.rule_for(FIELD_TITLE).unwrap().derivation.is_none());
        // untouched rules come back from the defaults
        assert_eq!(config.rule_for(FIELD_PRICING).unwrap().candidates[0], "price");
        assert_eq!(config.scoring.weights[FIELD_TITLE], 2.0);
        assert_eq!(config.validation.max_past_days, 365);
        assert_eq!(config.validation.today(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let toml = r#"
            [fields.venue_rating]
            candidates = ["rating"]
        "#;
        let err = ConverterConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("venue_rating"));
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        let toml = r#"
            [mapping]
            direct_confidence = 1.5
        "#;
        assert!(ConverterConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converter.toml");
        fs::write(&path, "[scoring]\nabsent_optional_credit = 0.25\n").unwrap();

        let config = ConverterConfig::load(&path).unwrap();
        assert_eq!(config.scoring.absent_optional_credit, 0.25);
        assert!(ConverterConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
