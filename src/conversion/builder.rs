use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::config::ConverterConfig;
use crate::constants::*;
use crate::conversion::diagnostics::{
    ConversionDiagnostics, ConversionIssue, DiagnosticsRecorder, FieldMapping, IssueType,
    MappingType, Severity,
};
use crate::conversion::mapper::{FieldMapper, MappedField};
use crate::conversion::scorer::ConfidenceScorer;
use crate::conversion::text::clean_text;
use crate::conversion::validators::date::{embedded_time, DateWindow};
use crate::conversion::validators::{SemanticType, ValidationResult, Validators};
use crate::domain::{Activity, Location, Pricing, RawRecord, Schedule};

static TIMEZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:UTC|GMT|[A-Za-z]+(?:/[A-Za-z0-9_+-]+){1,2})$").unwrap());

/// Keys that suggest the page lists venues rather than dated events
const VENUE_HINTS: [&str; 5] = ["hours", "opening_hours", "phone", "amenities", "website"];

/// Keys that suggest recurring classes or camps
const CLASS_HINTS: [&str; 7] = ["instructor", "session", "sessions", "enrollment", "course", "term", "class_name"];

/// Stages of one build run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Start,
    MappingRequired,
    RequiredFailed,
    Aborted,
    RequiredOk,
    MappingOptional,
    Scoring,
    Completed,
}

impl BuildState {
    fn can_advance_to(self, next: BuildState) -> bool {
        use BuildState::*;
        matches!(
            (self, next),
            (Start, MappingRequired)
                | (MappingRequired, RequiredFailed)
                | (MappingRequired, RequiredOk)
                | (RequiredFailed, Aborted)
                | (RequiredOk, MappingOptional)
                | (MappingOptional, Scoring)
                | (Scoring, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Aborted | BuildState::Completed)
    }
}

/// Per-record working state: the recorder plus where the run has got to
struct BuildRun {
    state: BuildState,
    recorder: DiagnosticsRecorder,
}

impl BuildRun {
    fn advance(&mut self, next: BuildState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal build transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(from = ?self.state, to = ?next, "build state");
        self.state = next;
    }

    fn finish(self, success: bool, score: u8) -> ConversionDiagnostics {
        debug_assert!(self.state.is_terminal(), "build finished in {:?}", self.state);
        self.recorder.finish(success, score)
    }
}

/// Maps and validates every activity field of one raw record and decides
/// whether an [`Activity`] can be built from it.
pub struct ActivityBuilder<'c> {
    config: &'c ConverterConfig,
    mapper: FieldMapper<'c>,
    validators: Validators,
    scorer: ConfidenceScorer<'c>,
}

impl<'c> ActivityBuilder<'c> {
    pub fn new(config: &'c ConverterConfig) -> Self {
        Self {
            config,
            mapper: FieldMapper::new(config),
            validators: Validators::from_config(&config.validation),
            scorer: ConfidenceScorer::new(&config.scoring),
        }
    }

    /// Build an activity from `raw`. Always returns diagnostics; the activity is
    /// `None` when a required field could not be resolved.
    pub fn build(&self, raw: &RawRecord, record_path: &str) -> (Option<Activity>, ConversionDiagnostics) {
        let mut run = BuildRun {
            state: BuildState::Start,
            recorder: DiagnosticsRecorder::new(record_path, Some(raw)),
        };

        run.advance(BuildState::MappingRequired);
        let title = self.resolve_title(raw, &mut run.recorder);
        let location = self.resolve_location(raw, &mut run.recorder);

        let (Some(title), Some(location)) = (title, location) else {
            run.advance(BuildState::RequiredFailed);
            run.advance(BuildState::Aborted);
            debug!(record = record_path, "required field unresolved, record aborted");
            return (None, run.finish(false, 0));
        };

        run.advance(BuildState::RequiredOk);
        run.advance(BuildState::MappingOptional);
        let description = self.resolve_description(raw, &mut run.recorder);
        let schedule = self.resolve_schedule(raw, &mut run.recorder);
        let pricing = self.resolve_pricing(raw, &mut run.recorder);
        let age_groups = self.resolve_age_groups(raw, &mut run.recorder);
        let registration_url = self.resolve_registration_url(raw, &mut run.recorder);
        let tags = self.resolve_tags(raw, &mut run.recorder);

        run.advance(BuildState::Scoring);
        let score = self.scorer.score(run.recorder.mappings());

        run.advance(BuildState::Completed);
        let activity = Activity {
            id: Activity::derive_id(&title, &location.name, schedule.start_date),
            title,
            description,
            location,
            schedule,
            pricing,
            age_groups,
            registration_url,
            tags,
        };
        debug!(record = record_path, title = %activity.title, score, "record converted");

        (Some(activity), run.finish(true, score))
    }

    fn resolve_title(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Option<String> {
        let mapped = self.mapper.map_field(raw, FIELD_TITLE);
        let Some(value) = mapped.value.clone() else {
            recorder.record_mapping(mapped.mapping);
            recorder.record_issue(self.missing_required(raw, FIELD_TITLE));
            return None;
        };

        let source = mapped.source_field().map(str::to_string);
        let result = self.validators.validate(SemanticType::Title, &value);
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(mapped.mapping.validated(result.valid, result.confidence));

        if result.normalized_value.is_empty() {
            recorder.record_issue(
                ConversionIssue::new(
                    IssueType::MissingField,
                    Severity::Error,
                    FIELD_TITLE,
                    "Title is empty after cleanup",
                    "Check that the title field holds text rather than markup or whitespace",
                )
                .with_source(source.as_deref()),
            );
            return None;
        }

        if !result.valid {
            recorder.record_issue(
                ConversionIssue::new(
                    IssueType::LowConfidence,
                    Severity::Warning,
                    FIELD_TITLE,
                    result.reason.clone().unwrap_or_default(),
                    "Review the title; the extractor may have mapped the wrong element",
                )
                .with_source(source.as_deref()),
            );
        }

        Some(result.normalized_value)
    }

    fn resolve_location(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Option<Location> {
        let mapped = self.mapper.map_field(raw, FIELD_LOCATION);
        let address_mapped = self.mapper.map_field(raw, FIELD_LOCATION_ADDRESS);
        let address = address_mapped
            .value
            .as_deref()
            .map(clean_text)
            .filter(|a| !a.is_empty());

        if mapped.value.is_none() {
            recorder.record_mapping(mapped.mapping);
            recorder.record_mapping(address_mapped.mapping);
            recorder.record_issue(self.missing_required(raw, FIELD_LOCATION));
            return None;
        }

        let source = mapped.source_field().map(str::to_string);
        let result = self.validators.location.assess(mapped.value.as_deref(), address.as_deref());
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(mapped.mapping.validated(result.valid, result.confidence));

        if !result.valid {
            recorder.record_mapping(address_mapped.mapping);
            recorder.record_issue(
                ConversionIssue::new(
                    IssueType::MissingField,
                    Severity::Error,
                    FIELD_LOCATION,
                    result.reason.unwrap_or_else(|| "Location name is unusable".to_string()),
                    "Check that the venue or location field holds a place name",
                )
                .with_source(source.as_deref()),
            );
            return None;
        }

        if result.is_low_confidence() {
            recorder.record_issue(
                ConversionIssue::new(
                    IssueType::LowConfidence,
                    Severity::Warning,
                    FIELD_LOCATION,
                    result.reason.clone().unwrap_or_default(),
                    "Confirm the venue with the source page before approving",
                )
                .with_source(source.as_deref()),
            );
        }

        match &address {
            Some(_) => {
                recorder.record_mapping(address_mapped.mapping.validated(true, 1.0));
            }
            None => {
                recorder.record_mapping(address_mapped.mapping);
                recorder.record_issue(self.missing_optional(FIELD_LOCATION_ADDRESS, Severity::Info));
            }
        }

        Some(Location {
            name: result.normalized_value,
            address,
        })
    }

    fn resolve_description(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Option<String> {
        let mapped = self.mapper.map_field(raw, FIELD_DESCRIPTION);
        let description = mapped.value.as_deref().map(clean_text).filter(|d| !d.is_empty());
        if description.is_none() {
            recorder.record_mapping(FieldMapping::missing(FIELD_DESCRIPTION));
            recorder.record_issue(self.missing_optional(FIELD_DESCRIPTION, Severity::Info));
            return None;
        }
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(mapped.mapping);
        description
    }

    fn resolve_schedule(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Schedule {
        let mut schedule = Schedule {
            timezone: self.config.validation.default_timezone.clone(),
            ..Schedule::default()
        };

        let date_mapped = self.mapper.map_field(raw, FIELD_START_DATE);
        let date_raw = date_mapped.value.clone();
        let date_source = date_mapped.source_field().map(str::to_string);
        match date_raw.as_deref() {
            None => {
                recorder.record_mapping(date_mapped.mapping);
                recorder.record_issue(self.missing_optional(FIELD_START_DATE, Severity::Warning));
            }
            Some(value) => {
                let assessment = self.validators.date.assess(value);
                let result = &assessment.result;
                self.note_mapping_quality(recorder, &date_mapped.mapping);
                recorder.record_mapping(date_mapped.mapping.validated(result.valid, result.confidence));

                if result.valid {
                    schedule.start_date = assessment.date;
                    let severity = match assessment.window {
                        Some(DateWindow::FarPast) => Some(Severity::Warning),
                        Some(DateWindow::FarFuture) | Some(DateWindow::YearInferred) => Some(Severity::Info),
                        _ => None,
                    };
                    if let Some(severity) = severity {
                        recorder.record_issue(
                            ConversionIssue::new(
                                IssueType::LowConfidence,
                                severity,
                                FIELD_START_DATE,
                                result.reason.clone().unwrap_or_default(),
                                "Verify the date against the source page",
                            )
                            .with_source(date_source.as_deref()),
                        );
                    }
                } else {
                    recorder.record_issue(
                        self.invalid_format(
                            FIELD_START_DATE,
                            result,
                            "Expected YYYY-MM-DD, MM/DD/YYYY or a date like 'December 15, 2024'",
                        )
                        .with_source(date_source.as_deref()),
                    );
                }
            }
        }

        // Start time, falling back to a time carried by the date value
        let time_mapped = self.mapper.map_field(raw, FIELD_START_TIME);
        let (start_mapped, range_end) = match time_mapped.value.clone() {
            Some(value) => {
                let value = if self.validators.date.parse(&value).is_some() {
                    embedded_time(&value).unwrap_or(value)
                } else {
                    value
                };
                match self.validators.time.split_range(&value) {
                    Some((start, end)) => (
                        MappedField {
                            value: Some(start),
                            ..time_mapped
                        },
                        Some(end),
                    ),
                    None => (
                        MappedField {
                            value: Some(value),
                            ..time_mapped
                        },
                        None,
                    ),
                }
            }
            None => match date_raw.as_deref().and_then(embedded_time) {
                Some(time) => (
                    self.mapper
                        .derived_from(FIELD_START_TIME, date_source.as_deref(), time),
                    None,
                ),
                None => (time_mapped, None),
            },
        };
        let start_source = start_mapped.source_field().map(str::to_string);
        schedule.start_time = self.resolve_time(recorder, start_mapped, FIELD_START_TIME);

        let end_mapped = self.mapper.map_field(raw, FIELD_END_TIME);
        let end_mapped = match (end_mapped.value.is_none(), range_end) {
            (true, Some(end)) => self
                .mapper
                .derived_from(FIELD_END_TIME, start_source.as_deref(), end),
            _ => end_mapped,
        };
        let end_source = end_mapped.source_field().map(str::to_string);
        schedule.end_time = self.resolve_time(recorder, end_mapped, FIELD_END_TIME);

        if let (Some(start), Some(end)) = (schedule.start_time, schedule.end_time) {
            if end <= start {
                schedule.end_time = None;
                recorder.record_issue(
                    ConversionIssue::new(
                        IssueType::InvalidFormat,
                        Severity::Warning,
                        FIELD_END_TIME,
                        format!("End time {} is not after start time {}", end.format("%H:%M"), start.format("%H:%M")),
                        "Check whether the end time belongs to a different day or session",
                    )
                    .with_source(end_source.as_deref()),
                );
            }
        }

        let tz_mapped = self.mapper.map_field(raw, FIELD_TIMEZONE);
        match tz_mapped.value.clone() {
            Some(tz) if TIMEZONE.is_match(&tz) => {
                recorder.record_mapping(tz_mapped.mapping.validated(true, 1.0));
                schedule.timezone = tz;
            }
            Some(tz) => {
                let source = tz_mapped.source_field().map(str::to_string);
                recorder.record_mapping(tz_mapped.mapping.validated(false, 0.0));
                recorder.record_issue(
                    ConversionIssue::new(
                        IssueType::InvalidFormat,
                        Severity::Warning,
                        FIELD_TIMEZONE,
                        format!("Unrecognized timezone '{}', using {}", tz, schedule.timezone),
                        "Use an IANA zone name such as America/Los_Angeles",
                    )
                    .with_source(source.as_deref()),
                );
            }
            None => {
                let defaulted = self.mapper.defaulted(FIELD_TIMEZONE, &schedule.timezone);
                recorder.record_mapping(defaulted.mapping);
            }
        }

        schedule.all_day = schedule.start_date.is_some() && schedule.start_time.is_none();
        schedule
    }

    /// Validate one time field. Invalid times leave the field unset with a warning.
    fn resolve_time(
        &self,
        recorder: &mut DiagnosticsRecorder,
        mapped: MappedField<'_>,
        field: &str,
    ) -> Option<NaiveTime> {
        let Some(value) = mapped.value.clone() else {
            recorder.record_mapping(mapped.mapping);
            recorder.record_issue(self.missing_optional(field, Severity::Info));
            return None;
        };
        let source = mapped.source_field().map(str::to_string);
        let result = self.validators.validate(SemanticType::Time, &value);
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(mapped.mapping.validated(result.valid, result.confidence));

        if !result.valid {
            recorder.record_issue(
                self.invalid_format(field, &result, "Expected a time like 14:00 or 2:00 PM")
                    .with_source(source.as_deref()),
            );
            return None;
        }
        if result.is_low_confidence() {
            recorder.record_issue(
                self.low_confidence(field, &result, "Confirm AM/PM with the source page")
                    .with_source(source.as_deref()),
            );
        }
        NaiveTime::parse_from_str(&result.normalized_value, "%H:%M").ok()
    }

    fn resolve_pricing(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Option<Pricing> {
        let mapped = self.mapper.map_field(raw, FIELD_PRICING);
        let Some(value) = mapped.value.clone() else {
            recorder.record_mapping(mapped.mapping);
            recorder.record_issue(self.missing_optional(FIELD_PRICING, Severity::Info));
            return None;
        };

        let source = mapped.source_field().map(str::to_string);
        let assessment = self.validators.price.assess(&value);
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(
            mapped
                .mapping
                .validated(assessment.result.valid, assessment.result.confidence),
        );
        if assessment.result.is_low_confidence() {
            recorder.record_issue(
                self.low_confidence(FIELD_PRICING, &assessment.result, "Review the price text and set the pricing type by hand")
                    .with_source(source.as_deref()),
            );
        }
        Some(assessment.pricing)
    }

    fn resolve_age_groups(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Vec<String> {
        let mapped = self.mapper.map_field(raw, FIELD_AGE_GROUPS);
        let Some(value) = mapped.value.clone() else {
            recorder.record_mapping(mapped.mapping);
            recorder.record_issue(self.missing_optional(FIELD_AGE_GROUPS, Severity::Info));
            return Vec::new();
        };

        let source = mapped.source_field().map(str::to_string);
        let assessment = self.validators.age_range.assess(&value);
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(
            mapped
                .mapping
                .validated(assessment.result.valid, assessment.result.confidence),
        );
        if assessment.result.is_low_confidence() {
            recorder.record_issue(
                self.low_confidence(
                    FIELD_AGE_GROUPS,
                    &assessment.result,
                    "Map the audience to toddler, preschool, school-age, teen, adult or all-ages",
                )
                .with_source(source.as_deref()),
            );
        }
        assessment.groups
    }

    fn resolve_registration_url(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Option<String> {
        let mapped = self.mapper.map_field(raw, FIELD_REGISTRATION_URL);
        let Some(value) = mapped.value.clone() else {
            recorder.record_mapping(mapped.mapping);
            recorder.record_issue(self.missing_optional(FIELD_REGISTRATION_URL, Severity::Info));
            return None;
        };

        let source = mapped.source_field().map(str::to_string);
        let result = self.validators.validate(SemanticType::Url, &value);
        self.note_mapping_quality(recorder, &mapped.mapping);
        recorder.record_mapping(mapped.mapping.validated(result.valid, result.confidence));

        if !result.valid {
            recorder.record_issue(
                self.invalid_format(FIELD_REGISTRATION_URL, &result, "Provide an absolute https:// link")
                    .with_source(source.as_deref()),
            );
            return None;
        }
        if result.reason.is_some() {
            recorder.record_issue(
                self.low_confidence(FIELD_REGISTRATION_URL, &result, "Check the link opens the registration page")
                    .with_source(source.as_deref()),
            );
        }
        Some(result.normalized_value)
    }

    fn resolve_tags(&self, raw: &RawRecord, recorder: &mut DiagnosticsRecorder) -> Vec<String> {
        let mapped = self.mapper.map_field(raw, FIELD_TAGS);
        let mut tags: Vec<String> = Vec::new();
        if let Some(value) = mapped.value.as_deref() {
            for tag in value.split(',').map(|t| clean_text(t).to_lowercase()) {
                if !tag.is_empty() && !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }

        if tags.is_empty() {
            recorder.record_mapping(FieldMapping::missing(FIELD_TAGS));
            recorder.record_issue(self.missing_optional(FIELD_TAGS, Severity::Info));
        } else {
            recorder.record_mapping(mapped.mapping);
        }
        tags
    }

    /// Flag derived values and late fallbacks for human review
    fn note_mapping_quality(&self, recorder: &mut DiagnosticsRecorder, mapping: &FieldMapping) {
        let weak = match mapping.mapping_type {
            MappingType::Derived => true,
            MappingType::Fallback => mapping.confidence < self.config.mapping.fallback_confidence,
            _ => false,
        };
        if !weak {
            return;
        }
        let source = mapping.source_field_used.as_deref().unwrap_or("unknown");
        recorder.record_issue(
            ConversionIssue::new(
                IssueType::LowConfidence,
                Severity::Info,
                &mapping.activity_field,
                format!(
                    "{} resolved via {} mapping from '{}'",
                    mapping.activity_field,
                    if mapping.mapping_type == MappingType::Derived { "derived" } else { "fallback" },
                    source
                ),
                format!("Confirm the {} value before approving", mapping.activity_field),
            )
            .with_source(mapping.source_field_used.as_deref()),
        );
    }

    fn missing_required(&self, raw: &RawRecord, field: &str) -> ConversionIssue {
        let tried = self
            .config
            .rule_for(field)
            .map(|rule| {
                let mut keys = rule.candidates.clone();
                if let Some(derivation) = &rule.derivation {
                    keys.extend(derivation.sources.iter().cloned());
                }
                keys.join(", ")
            })
            .unwrap_or_default();
        let present: Vec<&str> = raw.keys().map(String::as_str).take(8).collect();

        ConversionIssue::new(
            IssueType::MissingField,
            Severity::Error,
            field,
            format!("Required field '{}' not found (tried: {})", field, tried),
            format!(
                "Record has keys [{}]. Add one of the tried keys to the extraction schema, \
                 or try the '{}' schema type for this source",
                present.join(", "),
                suggest_schema(raw)
            ),
        )
    }

    fn missing_optional(&self, field: &str, severity: Severity) -> ConversionIssue {
        ConversionIssue::new(
            IssueType::MissingField,
            severity,
            field,
            format!("No value found for optional field '{}'", field),
            match self.config.rule_for(field) {
                Some(rule) if !rule.candidates.is_empty() => {
                    format!("Extract one of: {}", rule.candidates.join(", "))
                }
                _ => "Add this field to the extraction schema if the source lists it".to_string(),
            },
        )
    }

    fn invalid_format(&self, field: &str, result: &ValidationResult, suggestion: &str) -> ConversionIssue {
        ConversionIssue::new(
            IssueType::InvalidFormat,
            Severity::Warning,
            field,
            result
                .reason
                .clone()
                .unwrap_or_else(|| format!("Invalid value for '{}'", field)),
            suggestion,
        )
    }

    fn low_confidence(&self, field: &str, result: &ValidationResult, suggestion: &str) -> ConversionIssue {
        ConversionIssue::new(
            IssueType::LowConfidence,
            Severity::Info,
            field,
            result
                .reason
                .clone()
                .unwrap_or_else(|| format!("Low confidence value for '{}'", field)),
            suggestion,
        )
    }
}

/// Guess which extraction schema type a record looks like
pub fn suggest_schema(raw: &RawRecord) -> &'static str {
    let has = |keys: &[&str]| keys.iter().any(|k| raw.keys().any(|rk| rk.eq_ignore_ascii_case(k)));
    if has(&CLASS_HINTS) {
        SCHEMA_CLASSES
    } else if has(&VENUE_HINTS) && !has(&["date", "start_date", "event_date", "start"]) {
        SCHEMA_VENUES
    } else {
        SCHEMA_EVENTS
    }
}
