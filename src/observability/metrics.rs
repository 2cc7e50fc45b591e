//! Metrics for the conversion engine
//!
//! Recorded through the `metrics` facade. The library installs no exporter;
//! whichever recorder the host process installs receives these.

use std::fmt;

use crate::conversion::orchestrator::ConversionOutcome;

/// All metric names used by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RecordsTotal,
    Confidence,
    IssuesTotal,
    EmptyPayloads,
    BatchSize,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsTotal => "activity_conversion_records_total",
            MetricName::Confidence => "activity_conversion_confidence",
            MetricName::IssuesTotal => "activity_conversion_issues_total",
            MetricName::EmptyPayloads => "activity_conversion_empty_payloads_total",
            MetricName::BatchSize => "activity_conversion_batch_size",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::RecordsTotal,
            MetricName::Confidence,
            MetricName::IssuesTotal,
            MetricName::EmptyPayloads,
            MetricName::BatchSize,
        ]
        .into_iter()
    }

    /// Help text for dashboards
    pub fn description(&self) -> &'static str {
        match self {
            MetricName::RecordsTotal => "Raw records processed, labelled by outcome",
            MetricName::Confidence => "Confidence score of converted records",
            MetricName::IssuesTotal => "Conversion issues, labelled by type and severity",
            MetricName::EmptyPayloads => "Payloads where no record array was found",
            MetricName::BatchSize => "Records per conversion batch",
        }
    }
}

/// Register help text for every metric with the installed recorder
pub fn describe_all() {
    for metric in MetricName::all_metrics() {
        match metric {
            MetricName::Confidence | MetricName::BatchSize => {
                ::metrics::describe_histogram!(metric.as_str(), metric.description())
            }
            MetricName::RecordsTotal | MetricName::IssuesTotal | MetricName::EmptyPayloads => {
                ::metrics::describe_counter!(metric.as_str(), metric.description())
            }
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod conversion {
    use super::{ConversionOutcome, MetricName};
    use crate::conversion::diagnostics::{IssueType, Severity};

    /// Record one outcome: the records counter, its confidence and each issue
    pub fn outcome_recorded(outcome: &ConversionOutcome) {
        if outcome.is_success() {
            record_converted();
            confidence_recorded(outcome.diagnostics.confidence_score);
        } else {
            record_failed();
        }
        for issue in &outcome.diagnostics.issues {
            issue_detected(issue.issue_type, issue.severity);
        }
    }

    pub fn record_converted() {
        ::metrics::counter!(MetricName::RecordsTotal.as_str(), "outcome" => "converted").increment(1);
    }

    pub fn record_failed() {
        ::metrics::counter!(MetricName::RecordsTotal.as_str(), "outcome" => "failed").increment(1);
    }

    pub fn confidence_recorded(score: u8) {
        ::metrics::histogram!(MetricName::Confidence.as_str()).record(f64::from(score));
    }

    pub fn issue_detected(issue_type: IssueType, severity: Severity) {
        let issue_type = match issue_type {
            IssueType::MissingField => "missing_field",
            IssueType::InvalidFormat => "invalid_format",
            IssueType::LowConfidence => "low_confidence",
        };
        let severity = match severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        ::metrics::counter!(
            MetricName::IssuesTotal.as_str(),
            "type" => issue_type,
            "severity" => severity
        )
        .increment(1);
    }

    pub fn empty_payload() {
        ::metrics::counter!(MetricName::EmptyPayloads.as_str()).increment(1);
    }

    pub fn batch_processed(size: usize) {
        ::metrics::histogram!(MetricName::BatchSize.as_str()).record(size as f64);
    }
}
