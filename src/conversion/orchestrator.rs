use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::ConverterConfig;
use crate::constants::{FIELD_ROOT, FIELD_TITLE};
use crate::conversion::builder::ActivityBuilder;
use crate::conversion::diagnostics::{
    ConversionDiagnostics, ConversionIssue, DiagnosticsRecorder, IssueSummary, IssueType, Severity,
};
use crate::conversion::mapper::lookup;
use crate::domain::{Activity, RawRecord};
use crate::observability::metrics;

/// One raw record's result. `activity` is `None` when the record could not be converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutcome {
    pub activity: Option<Activity>,
    pub diagnostics: ConversionDiagnostics,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.activity.is_some()
    }
}

/// Totals over one `convert_all` result list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    /// Mean confidence of converted records, 0 when none converted
    pub mean_confidence: f64,
    pub issues: IssueSummary,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[ConversionOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        let mut confidence_sum = 0.0;
        for outcome in outcomes {
            if outcome.is_success() {
                summary.converted += 1;
                confidence_sum += f64::from(outcome.diagnostics.confidence_score);
            } else {
                summary.failed += 1;
            }
            summary.issues.merge(&outcome.diagnostics.summary());
        }
        if summary.converted > 0 {
            summary.mean_confidence = confidence_sum / summary.converted as f64;
        }
        summary
    }
}

/// Where the records of a payload were found
enum Located<'a> {
    Array { path: String, items: &'a [Value] },
    Single(&'a RawRecord),
    EmptyContainer(String),
    NotFound,
}

/// Entry point: locates the record array in an extraction payload and builds
/// one outcome per record. Holds no state between calls.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[instrument(skip_all)]
    pub fn convert_all(&self, payload: &Value) -> Vec<ConversionOutcome> {
        let builder = ActivityBuilder::new(&self.config);

        let outcomes = match self.locate(payload) {
            Located::Array { path, items } => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let record_path = format!("{}[{}]", path, index);
                    match item.as_object() {
                        Some(raw) => self.convert_record(&builder, raw, &record_path),
                        None => not_an_object(item, &record_path),
                    }
                })
                .collect(),
            Located::Single(raw) => vec![self.convert_record(&builder, raw, "$")],
            Located::EmptyContainer(path) => {
                metrics::conversion::empty_payload();
                vec![empty_container(&path)]
            }
            Located::NotFound => {
                metrics::conversion::empty_payload();
                vec![self.no_records_found(payload)]
            }
        };

        for outcome in &outcomes {
            metrics::conversion::outcome_recorded(outcome);
            if !outcome.is_success() {
                warn!(
                    record = %outcome.diagnostics.record_path,
                    errors = outcome.diagnostics.summary().errors,
                    "record not converted"
                );
            }
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        metrics::conversion::batch_processed(summary.total);
        info!(
            total = summary.total,
            converted = summary.converted,
            failed = summary.failed,
            mean_confidence = summary.mean_confidence,
            "conversion batch complete"
        );
        outcomes
    }

    fn convert_record(&self, builder: &ActivityBuilder<'_>, raw: &RawRecord, record_path: &str) -> ConversionOutcome {
        let (activity, diagnostics) = builder.build(raw, record_path);
        ConversionOutcome { activity, diagnostics }
    }

    fn locate<'a>(&self, payload: &'a Value) -> Located<'a> {
        let object = match payload {
            Value::Array(items) if items.is_empty() => return Located::EmptyContainer("$".to_string()),
            Value::Array(items) => {
                return Located::Array {
                    path: "$".to_string(),
                    items,
                }
            }
            Value::Object(object) => object,
            _ => return Located::NotFound,
        };

        let mut first_empty: Option<String> = None;
        let mut found = |path: String, items: &'a [Value]| -> Option<Located<'a>> {
            if items.is_empty() {
                first_empty.get_or_insert(path);
                None
            } else {
                Some(Located::Array { path, items })
            }
        };

        for key in &self.config.container_keys {
            let Some((value, used_key)) = lookup(object, key) else {
                continue;
            };
            match value {
                Value::Array(items) => {
                    if let Some(located) = found(format!("$.{}", used_key), items.as_slice()) {
                        return located;
                    }
                }
                // {"data": {"events": [...]}}: one level deeper only
                Value::Object(inner) => {
                    for inner_key in &self.config.container_keys {
                        if let Some((Value::Array(items), inner_used)) = lookup(inner, inner_key) {
                            if let Some(located) = found(format!("$.{}.{}", used_key, inner_used), items.as_slice()) {
                                return located;
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(path) = first_empty {
            return Located::EmptyContainer(path);
        }
        if self.looks_like_record(object) {
            debug!("payload treated as a single record");
            return Located::Single(object);
        }
        Located::NotFound
    }

    fn looks_like_record(&self, object: &RawRecord) -> bool {
        self.config
            .rule_for(FIELD_TITLE)
            .map(|rule| rule.candidates.iter().any(|c| lookup(object, c).is_some()))
            .unwrap_or(false)
    }

    fn no_records_found(&self, payload: &Value) -> ConversionOutcome {
        let present = match payload {
            Value::Object(object) if !object.is_empty() => {
                format!("Payload keys: [{}]. ", object.keys().cloned().collect::<Vec<_>>().join(", "))
            }
            Value::Object(_) => "Payload is an empty object. ".to_string(),
            other => format!("Payload is {}, not an object. ", json_kind(other)),
        };

        let mut recorder = DiagnosticsRecorder::new("$", None);
        recorder.record_issue(ConversionIssue::new(
            IssueType::MissingField,
            Severity::Error,
            FIELD_ROOT,
            "no events found in extracted data",
            format!(
                "{}Tried container keys: {}. Check the extraction schema type or add the \
                 payload's container key to the converter configuration",
                present,
                self.config.container_keys.join(", ")
            ),
        ));
        ConversionOutcome {
            activity: None,
            diagnostics: recorder.finish(false, 0),
        }
    }
}

fn empty_container(path: &str) -> ConversionOutcome {
    let mut recorder = DiagnosticsRecorder::new(path, None);
    recorder.record_issue(ConversionIssue::new(
        IssueType::MissingField,
        Severity::Error,
        FIELD_ROOT,
        format!("no events found in extracted data: '{}' is an empty array", path),
        "The extractor found the container but no items. Check that the page lists \
         activities or try a different schema type",
    ));
    ConversionOutcome {
        activity: None,
        diagnostics: recorder.finish(false, 0),
    }
}

fn not_an_object(item: &Value, record_path: &str) -> ConversionOutcome {
    let mut recorder = DiagnosticsRecorder::new(record_path, None);
    recorder.record_issue(ConversionIssue::new(
        IssueType::InvalidFormat,
        Severity::Error,
        FIELD_ROOT,
        format!("Record at {} is {}, expected an object", record_path, json_kind(item)),
        "Each item in the record array must be an object of field names to values",
    ));
    ConversionOutcome {
        activity: None,
        diagnostics: recorder.finish(false, 0),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
