use activity_converter::config::ConverterConfig;
use activity_converter::constants::*;
use activity_converter::conversion::validators::DateValidator;
use activity_converter::conversion::{ConversionOutcome, Converter, IssueType, MappingType, Severity};
use activity_converter::domain::PricingType;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};

fn pinned_config() -> ConverterConfig {
    let mut config = ConverterConfig::default();
    config.validation.reference_date = NaiveDate::from_ymd_opt(2024, 12, 1);
    config
}

fn convert(payload: Value) -> Vec<ConversionOutcome> {
    Converter::new(pinned_config()).convert_all(&payload)
}

fn without_timing(mut outcomes: Vec<ConversionOutcome>) -> Vec<ConversionOutcome> {
    for outcome in &mut outcomes {
        outcome.diagnostics.processing_time_ms = 0.0;
    }
    outcomes
}

#[test]
fn well_formed_event_converts_with_good_confidence() {
    let outcomes = convert(json!({"events": [{
        "title": "Kids Art Workshop",
        "location": "Seattle Community Center",
        "date": "12/15/2024"
    }]}));

    assert_eq!(outcomes.len(), 1);
    let activity = outcomes[0].activity.as_ref().expect("activity built");
    let diagnostics = &outcomes[0].diagnostics;

    assert_eq!(activity.title, "Kids Art Workshop");
    assert_eq!(activity.location.name, "Seattle Community Center");
    assert_eq!(activity.schedule.start_date, NaiveDate::from_ymd_opt(2024, 12, 15));
    assert!(activity.schedule.all_day);
    assert!(diagnostics.success);
    assert!(diagnostics.confidence_score >= 60, "score {}", diagnostics.confidence_score);
}

#[test]
fn record_without_title_fails_with_missing_field_error() {
    let outcomes = convert(json!({"events": [{"description": "no title here"}]}));

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].activity.is_none());
    let diagnostics = &outcomes[0].diagnostics;
    assert!(!diagnostics.success);

    let issue = diagnostics.issues_for(FIELD_TITLE).next().expect("title issue");
    assert_eq!(issue.issue_type, IssueType::MissingField);
    assert_eq!(issue.severity, Severity::Error);
    assert!(!issue.suggestion.is_empty());
}

#[test]
fn empty_payload_reports_tried_container_keys() {
    let outcomes = convert(json!({}));

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].activity.is_none());
    let diagnostics = &outcomes[0].diagnostics;
    assert!(!diagnostics.success);
    assert_eq!(diagnostics.confidence_score, 0);

    let issue = &diagnostics.issues[0];
    assert_eq!(issue.issue_type, IssueType::MissingField);
    assert_eq!(issue.field, FIELD_ROOT);
    assert_eq!(issue.message, "no events found in extracted data");
    for key in DEFAULT_CONTAINER_KEYS {
        assert!(issue.suggestion.contains(key), "suggestion should name '{}'", key);
    }
}

#[test]
fn non_standard_field_names_map_via_fallback() {
    let outcomes = convert(json!({"activities": [{
        "name": "Pumpkin Patch",
        "venue": "Remlinger Farms",
        "price": "Free"
    }]}));

    let activity = outcomes[0].activity.as_ref().expect("activity built");
    let diagnostics = &outcomes[0].diagnostics;

    assert_eq!(activity.title, "Pumpkin Patch");
    assert_eq!(activity.location.name, "Remlinger Farms");
    assert_eq!(activity.pricing.as_ref().unwrap().pricing_type, PricingType::Free);

    let title = &diagnostics.field_mappings[FIELD_TITLE];
    assert_eq!(title.mapping_type, MappingType::Fallback);
    assert_eq!(title.source_field_used.as_deref(), Some("name"));
    assert!(
        (60..=80).contains(&diagnostics.confidence_score),
        "score {}",
        diagnostics.confidence_score
    );
}

#[test]
fn malformed_records_do_not_abort_the_batch() {
    let outcomes = convert(json!({"events": [
        {"title": "Story Time", "location": "Ballard Library"},
        {"description": "untitled"},
        {"title": "Family Swim", "venue": "Medgar Evers Pool"},
        {"location": "Somewhere"},
        {"title": "Teen Coding Club", "location": "Capitol Hill Library"}
    ]}));

    assert_eq!(outcomes.len(), 5);
    let converted: Vec<_> = outcomes.iter().filter_map(|o| o.activity.as_ref()).collect();
    assert_eq!(converted.len(), 3);

    let failed: Vec<_> = outcomes.iter().filter(|o| o.activity.is_none()).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|o| !o.diagnostics.success));
    assert_eq!(failed[0].diagnostics.record_path, "$.events[1]");
    assert_eq!(failed[1].diagnostics.record_path, "$.events[3]");
}

#[test]
fn unparseable_date_keeps_the_activity() {
    let outcomes = convert(json!({"events": [{"title": "X", "location": "Y", "date": "not-a-date"}]}));

    let activity = outcomes[0].activity.as_ref().expect("activity built");
    assert!(activity.schedule.start_date.is_none());

    let invalid: Vec<_> = outcomes[0]
        .diagnostics
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::InvalidFormat)
        .collect();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].field, FIELD_START_DATE);
    assert_eq!(invalid[0].source_field.as_deref(), Some("date"));
    assert_eq!(invalid[0].severity, Severity::Warning);
}

#[test]
fn date_times_with_unicode_spaces_convert() {
    let outcomes = convert(json!({"events": [
        {"title": "Story Time", "location": "Ballard Library", "date": "2024-12-10"},
        {"title": "Kids Art", "location": "Center", "date": "2024-12-15\u{a0}10:00"},
        {"title": "Puppet Show", "location": "Center", "date": "12/15/2024\u{202f}3:00 PM"},
        {"title": "Family Swim", "location": "Pool", "date": "12/15/2024\u{2009}9:30am"}
    ]}));

    assert_eq!(outcomes.len(), 4);
    let times: Vec<Option<NaiveTime>> = outcomes
        .iter()
        .map(|o| o.activity.as_ref().expect("activity built").schedule.start_time)
        .collect();
    assert_eq!(
        times,
        vec![
            None,
            NaiveTime::from_hms_opt(10, 0, 0),
            NaiveTime::from_hms_opt(15, 0, 0),
            NaiveTime::from_hms_opt(9, 30, 0),
        ]
    );
    for outcome in &outcomes[1..] {
        assert_eq!(
            outcome.activity.as_ref().unwrap().schedule.start_date,
            NaiveDate::from_ymd_opt(2024, 12, 15)
        );
    }
}

#[test]
fn conversion_is_idempotent() {
    let payload: Value = serde_json::from_str(include_str!("resources/seattle_parks.json")).unwrap();
    let converter = Converter::new(pinned_config());

    let first = without_timing(converter.convert_all(&payload));
    let second = without_timing(converter.convert_all(&payload));
    assert_eq!(first, second);
}

#[test]
fn container_key_does_not_change_the_result() {
    let record = json!({"title": "Story Time", "venue": "Ballard Library", "date": "2024-12-10", "price": "$5"});
    let results: Vec<ConversionOutcome> = ["events", "activities", "venues"]
        .iter()
        .map(|key| {
            let mut payload = serde_json::Map::new();
            payload.insert(key.to_string(), json!([record.clone()]));
            convert(Value::Object(payload)).remove(0)
        })
        .collect();

    for outcome in &results[1..] {
        assert_eq!(outcome.activity, results[0].activity);
        assert_eq!(outcome.diagnostics.field_mappings, results[0].diagnostics.field_mappings);
        assert_eq!(outcome.diagnostics.issues, results[0].diagnostics.issues);
        assert_eq!(outcome.diagnostics.confidence_score, results[0].diagnostics.confidence_score);
    }
}

#[test]
fn converted_activities_always_have_title_and_location() {
    let payload: Value = serde_json::from_str(include_str!("resources/seattle_parks.json")).unwrap();
    let outcomes = convert(payload);

    assert_eq!(outcomes.len(), 5);
    for activity in outcomes.iter().filter_map(|o| o.activity.as_ref()) {
        assert!(!activity.title.is_empty());
        assert!(!activity.location.name.is_empty());
    }
}

#[test]
fn every_record_gets_bounded_confidence_and_actionable_issues() {
    let payloads = [
        json!({}),
        json!([]),
        json!("not an object"),
        json!({"events": [1, null, {"title": ""}]}),
        serde_json::from_str(include_str!("resources/seattle_parks.json")).unwrap(),
    ];

    for payload in payloads {
        for outcome in convert(payload) {
            assert!(outcome.diagnostics.confidence_score <= 100);
            assert_eq!(outcome.diagnostics.success, outcome.activity.is_some());
            for issue in &outcome.diagnostics.issues {
                assert!(!issue.message.is_empty());
                assert!(!issue.suggestion.is_empty(), "issue without suggestion: {:?}", issue);
            }
        }
    }
}

#[test]
fn supported_date_formats_normalize_to_the_same_iso_date() {
    let validator = DateValidator::new(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(), 365, 730);
    let inputs = [
        "2024-12-15",
        "2024-12-15T10:00:00",
        "12/15/2024",
        "12-15-2024",
        "12/15/24",
        "December 15, 2024",
        "Dec 15th, 2024",
        "Sunday, December 15, 2024",
        "15 December 2024",
    ];

    for input in inputs {
        let assessment = validator.assess(input);
        assert!(assessment.result.valid, "{} should parse", input);
        assert_eq!(assessment.result.normalized_value, "2024-12-15", "input {}", input);
    }
}

#[test]
fn mixed_source_payload_resolves_every_field_kind() {
    let payload: Value = serde_json::from_str(include_str!("resources/seattle_parks.json")).unwrap();
    let outcomes = convert(payload);

    let tumble = outcomes[2].activity.as_ref().expect("toddler tumble converts");
    assert_eq!(tumble.title, "Toddler Tumble");
    assert_eq!(tumble.schedule.start_date, NaiveDate::from_ymd_opt(2024, 12, 21));
    assert_eq!(tumble.age_groups, vec!["toddler"]);
    assert_eq!(tumble.pricing.as_ref().unwrap().pricing_type, PricingType::Donation);
    assert_eq!(tumble.registration_url.as_deref(), Some("https://www.example.org/tumble"));

    let lantern = &outcomes[4];
    assert!(lantern.activity.is_some());
    assert!(lantern
        .diagnostics
        .issues_for(FIELD_LOCATION)
        .any(|i| i.issue_type == IssueType::LowConfidence && i.severity == Severity::Warning));
}

#[test]
fn injected_schema_table_changes_mapping() {
    let config = ConverterConfig::from_toml_str(
        r#"
        container_keys = ["listings"]

        [fields.title]
        candidates = ["program_name"]

        [validation]
        reference_date = "2024-12-01"
        "#,
    )
    .unwrap();
    let converter = Converter::new(config);

    let outcomes = converter.convert_all(&json!({"listings": [{"program_name": "Junior Chess", "venue": "Library"}]}));
    assert_eq!(outcomes[0].activity.as_ref().unwrap().title, "Junior Chess");
    assert_eq!(outcomes[0].diagnostics.record_path, "$.listings[0]");

    // The default converter knows neither the key nor the field name
    let default = Converter::new(pinned_config())
        .convert_all(&json!({"listings": [{"program_name": "Junior Chess", "venue": "Library"}]}));
    assert!(default[0].activity.is_none());
}

#[test]
fn example_config_file_is_valid() {
    let config = ConverterConfig::from_toml_str(include_str!("../converter.example.toml")).unwrap();
    assert_eq!(config, ConverterConfig::default());
}
