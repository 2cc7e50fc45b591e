use serde_json::Value;
use tracing::trace;

use crate::config::{ConverterConfig, Derivation, MappingConfig};
use crate::conversion::diagnostics::{FieldMapping, MappingType, ValidationStatus};
use crate::conversion::text::clean_text;
use crate::domain::RawRecord;

/// Keys consulted, in order, when an object stands in for a scalar value.
const OBJECT_TEXT_KEYS: [&str; 5] = ["name", "title", "text", "value", "label"];

/// Result of resolving one activity field against a raw record
#[derive(Debug, Clone)]
pub struct MappedField<'a> {
    pub mapping: FieldMapping,
    /// Coerced text value, `None` when the field is missing
    pub value: Option<String>,
    /// The raw JSON the value came from; derived and default values have none
    pub source: Option<&'a Value>,
}

impl<'a> MappedField<'a> {
    fn missing(activity_field: &str) -> Self {
        Self {
            mapping: FieldMapping::missing(activity_field),
            value: None,
            source: None,
        }
    }

    pub fn source_field(&self) -> Option<&str> {
        self.mapping.source_field_used.as_deref()
    }
}

/// Resolves activity fields from raw records using the configured candidate lists
pub struct FieldMapper<'c> {
    config: &'c ConverterConfig,
}

impl<'c> FieldMapper<'c> {
    pub fn new(config: &'c ConverterConfig) -> Self {
        Self { config }
    }

    /// Map a field using its configured rule. Fields without a rule are missing.
    pub fn map_field<'r>(&self, raw: &'r RawRecord, activity_field: &str) -> MappedField<'r> {
        match self.config.rule_for(activity_field) {
            Some(rule) => self.map(raw, activity_field, &rule.candidates, rule.derivation.as_ref()),
            None => MappedField::missing(activity_field),
        }
    }

    /// Scan `candidates` in order; the first value with text left after cleanup wins.
    /// Falls back to `derivation` when no candidate matches.
    pub fn map<'r>(
        &self,
        raw: &'r RawRecord,
        activity_field: &str,
        candidates: &[String],
        derivation: Option<&Derivation>,
    ) -> MappedField<'r> {
        let confidences = &self.config.mapping;

        for (position, candidate) in candidates.iter().enumerate() {
            let Some((value, key)) = lookup(raw, candidate) else {
                continue;
            };
            let Some(text) = coerce_text(value).filter(|t| has_content(t)) else {
                trace!(field = activity_field, candidate = %candidate, "candidate present but empty after cleanup");
                continue;
            };

            let (mapping_type, confidence) = if position == 0 {
                (MappingType::Direct, confidences.direct_confidence)
            } else {
                (MappingType::Fallback, fallback_confidence(confidences, position))
            };
            trace!(field = activity_field, source = %key, ?mapping_type, "mapped field");

            return MappedField {
                mapping: FieldMapping {
                    activity_field: activity_field.to_string(),
                    source_field_used: Some(key),
                    mapping_type,
                    confidence,
                    validation_status: ValidationStatus::Unvalidated,
                    validation_confidence: 1.0,
                },
                value: Some(text),
                source: Some(value),
            };
        }

        if let Some(derived) = derivation.and_then(|d| derive(raw, d)) {
            let (text, used) = derived;
            trace!(field = activity_field, sources = %used, "derived field");
            return MappedField {
                mapping: FieldMapping {
                    activity_field: activity_field.to_string(),
                    source_field_used: Some(used),
                    mapping_type: MappingType::Derived,
                    confidence: confidences.derived_confidence,
                    validation_status: ValidationStatus::Unvalidated,
                    validation_confidence: 1.0,
                },
                value: Some(text),
                source: None,
            };
        }

        MappedField::missing(activity_field)
    }

    /// Wrap a configured default as a mapping
    pub fn defaulted<'r>(&self, activity_field: &str, value: &str) -> MappedField<'r> {
        MappedField {
            mapping: FieldMapping {
                activity_field: activity_field.to_string(),
                source_field_used: None,
                mapping_type: MappingType::Default,
                confidence: self.config.mapping.default_confidence,
                validation_status: ValidationStatus::Unvalidated,
                validation_confidence: 1.0,
            },
            value: Some(value.to_string()),
            source: None,
        }
    }

    /// A value computed by the builder from another mapped field
    pub fn derived_from<'r>(&self, activity_field: &str, source_field: Option<&str>, value: String) -> MappedField<'r> {
        MappedField {
            mapping: FieldMapping {
                activity_field: activity_field.to_string(),
                source_field_used: source_field.map(str::to_string),
                mapping_type: MappingType::Derived,
                confidence: self.config.mapping.derived_confidence,
                validation_status: ValidationStatus::Unvalidated,
                validation_confidence: 1.0,
            },
            value: Some(value),
            source: None,
        }
    }
}

/// `position` is the zero-based index of a non-first candidate
fn fallback_confidence(config: &MappingConfig, position: usize) -> f64 {
    let steps = position.saturating_sub(1) as f64;
    (config.fallback_confidence - config.fallback_step * steps).max(config.fallback_floor)
}

fn derive(raw: &RawRecord, derivation: &Derivation) -> Option<(String, String)> {
    let mut parts = Vec::new();
    let mut used = Vec::new();
    for source in &derivation.sources {
        if let Some(text) = lookup(raw, source)
            .and_then(|(v, _)| coerce_text(v))
            .filter(|t| has_content(t))
        {
            if parts.contains(&text) {
                continue;
            }
            parts.push(text);
            used.push(source.as_str());
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some((parts.join(&derivation.separator), used.join("+")))
    }
}

/// Markup-only values like `<span></span>` or `&nbsp;` carry no text
fn has_content(text: &str) -> bool {
    !clean_text(text).is_empty()
}

/// Find a value by key or dotted path. Exact keys win over case-insensitive matches.
/// Returns the value and the key path as it appears in the record.
pub fn lookup<'a>(raw: &'a RawRecord, path: &str) -> Option<(&'a Value, String)> {
    if let Some((key, value)) = get_key(raw, path) {
        return Some((value, key.to_string()));
    }
    if !path.contains('.') {
        return None;
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let (key, mut current) = get_key(raw, first)?;
    let mut used = vec![key.as_str()];
    for segment in segments {
        let object = current.as_object()?;
        let (key, value) = get_key(object, segment)?;
        used.push(key.as_str());
        current = value;
    }
    Some((current, used.join(".")))
}

fn get_key<'a>(object: &'a RawRecord, key: &str) -> Option<(&'a String, &'a Value)> {
    object
        .iter()
        .find(|(k, _)| k.as_str() == key)
        .or_else(|| object.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
}

/// Best-effort conversion of an arbitrary JSON value to display text.
/// Empty strings, booleans, null and empty containers count as absent.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter(|item| !item.is_array())
                .filter_map(coerce_text)
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(map) => OBJECT_TEXT_KEYS.iter().find_map(|key| {
            map.get(*key)
                .filter(|v| v.is_string() || v.is_number())
                .and_then(coerce_text)
        }),
        Value::Bool(_) | Value::Null => None,
    }
}
