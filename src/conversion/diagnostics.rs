use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::domain::RawRecord;

/// How a source field was chosen for an activity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    /// First candidate key matched
    Direct,
    /// A later candidate key matched
    Fallback,
    /// Computed from other raw fields
    Derived,
    /// Configured default, nothing in the record
    Default,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Unvalidated,
}

/// One mapping decision for one activity field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub activity_field: String,
    pub source_field_used: Option<String>,
    pub mapping_type: MappingType,
    /// Mapping confidence, 0.0 to 1.0
    pub confidence: f64,
    pub validation_status: ValidationStatus,
    /// Confidence reported by the validator, 1.0 while unvalidated
    pub validation_confidence: f64,
}

impl FieldMapping {
    pub fn missing(activity_field: &str) -> Self {
        Self {
            activity_field: activity_field.to_string(),
            source_field_used: None,
            mapping_type: MappingType::Missing,
            confidence: 0.0,
            validation_status: ValidationStatus::Unvalidated,
            validation_confidence: 1.0,
        }
    }

    /// Consume the mapping and attach a validation verdict
    pub fn validated(self, valid: bool, validation_confidence: f64) -> Self {
        Self {
            validation_status: if valid {
                ValidationStatus::Valid
            } else {
                ValidationStatus::Invalid
            },
            validation_confidence: validation_confidence.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn is_missing(&self) -> bool {
        self.mapping_type == MappingType::Missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissingField,
    InvalidFormat,
    LowConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub field: String,
    /// Raw key the offending value came from, when there was one
    pub source_field: Option<String>,
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

impl ConversionIssue {
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        field: &str,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            field: field.to_string(),
            source_field: None,
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }

    pub fn with_source(mut self, source_field: Option<&str>) -> Self {
        self.source_field = source_field.map(str::to_string);
        self
    }
}

/// Per-record conversion report, produced whether or not an activity was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionDiagnostics {
    pub processing_time_ms: f64,
    pub success: bool,
    /// 0 to 100
    pub confidence_score: u8,
    pub field_mappings: BTreeMap<String, FieldMapping>,
    pub issues: Vec<ConversionIssue>,
    /// JSON path of the record inside the payload, e.g. `$.events[3]`
    pub record_path: String,
    /// SHA-256 of the raw record, empty for payload-level reports
    pub record_digest: String,
}

/// Issue counts for the admin review surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub by_type: BTreeMap<IssueType, usize>,
}

impl IssueSummary {
    pub fn add(&mut self, issue: &ConversionIssue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
        *self.by_type.entry(issue.issue_type).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &IssueSummary) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.infos += other.infos;
        for (issue_type, count) in &other.by_type {
            *self.by_type.entry(*issue_type).or_insert(0) += count;
        }
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }
}

impl ConversionDiagnostics {
    pub fn summary(&self) -> IssueSummary {
        let mut summary = IssueSummary::default();
        for issue in &self.issues {
            summary.add(issue);
        }
        summary
    }

    pub fn issues_for(&self, field: &str) -> impl Iterator<Item = &ConversionIssue> {
        let field = field.to_string();
        self.issues.iter().filter(move |i| i.field == field)
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Collects mapping decisions and issues inline while one record is built
pub struct DiagnosticsRecorder {
    started: Instant,
    record_path: String,
    record_digest: String,
    field_mappings: BTreeMap<String, FieldMapping>,
    issues: Vec<ConversionIssue>,
}

impl DiagnosticsRecorder {
    pub fn new(record_path: impl Into<String>, raw: Option<&RawRecord>) -> Self {
        Self {
            started: Instant::now(),
            record_path: record_path.into(),
            record_digest: raw.map(record_digest).unwrap_or_default(),
            field_mappings: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    pub fn record_mapping(&mut self, mapping: FieldMapping) {
        self.field_mappings
            .insert(mapping.activity_field.clone(), mapping);
    }

    pub fn record_issue(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    pub fn mappings(&self) -> &BTreeMap<String, FieldMapping> {
        &self.field_mappings
    }

    pub fn finish(self, success: bool, confidence_score: u8) -> ConversionDiagnostics {
        ConversionDiagnostics {
            processing_time_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            success,
            confidence_score: confidence_score.min(100),
            field_mappings: self.field_mappings,
            issues: self.issues,
            record_path: self.record_path,
            record_digest: self.record_digest,
        }
    }
}

/// Hex SHA-256 over the record's canonical JSON (keys are sorted by serde_json)
pub fn record_digest(raw: &RawRecord) -> String {
    let canonical = serde_json::to_vec(raw).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(issue_type: IssueType, severity: Severity) -> ConversionIssue {
        ConversionIssue::new(issue_type, severity, "title", "msg", "fix it")
    }

    #[test]
    fn test_recorder_finishes_with_everything_collected() {
        let raw = json!({"title": "Story Time"}).as_object().cloned().unwrap();
        let mut recorder = DiagnosticsRecorder::new("$.events[0]", Some(&raw));
        recorder.record_mapping(FieldMapping::missing("pricing"));
        recorder.record_issue(issue(IssueType::MissingField, Severity::Info));

        let diagnostics = recorder.finish(true, 120);
        assert!(diagnostics.success);
        assert_eq!(diagnostics.confidence_score, 100);
        assert_eq!(diagnostics.field_mappings.len(), 1);
        assert_eq!(diagnostics.issues.len(), 1);
        assert_eq!(diagnostics.record_path, "$.events[0]");
        assert_eq!(diagnostics.record_digest.len(), 64);
        assert!(diagnostics.processing_time_ms >= 0.0);
    }

    #[test]
    fn test_summary_counts_by_severity_and_type() {
        let mut recorder = DiagnosticsRecorder::new("$.events[0]", None);
        recorder.record_issue(issue(IssueType::MissingField, Severity::Error));
        recorder.record_issue(issue(IssueType::InvalidFormat, Severity::Warning));
        recorder.record_issue(issue(IssueType::InvalidFormat, Severity::Warning));
        recorder.record_issue(issue(IssueType::LowConfidence, Severity::Info));

        let summary = recorder.finish(false, 0).summary();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.infos, 1);
        assert_eq!(summary.by_type[&IssueType::InvalidFormat], 2);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let a = json!({"title": "A", "venue": "B"}).as_object().cloned().unwrap();
        let b = json!({"venue": "B", "title": "A"}).as_object().cloned().unwrap();
        assert_eq!(record_digest(&a), record_digest(&b));
    }

    #[test]
    fn test_issue_serializes_wire_names() {
        let value = serde_json::to_value(
            issue(IssueType::MissingField, Severity::Error).with_source(Some("name")),
        )
        .unwrap();
        assert_eq!(value["type"], json!("missing_field"));
        assert_eq!(value["severity"], json!("error"));
        assert_eq!(value["sourceField"], json!("name"));
    }
}
