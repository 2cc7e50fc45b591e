/// Activity field keys shared by mappings, issues and the scoring table.
pub const FIELD_TITLE: &str = "title";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_LOCATION_ADDRESS: &str = "location.address";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_START_DATE: &str = "schedule.startDate";
pub const FIELD_START_TIME: &str = "schedule.startTime";
pub const FIELD_END_TIME: &str = "schedule.endTime";
pub const FIELD_TIMEZONE: &str = "schedule.timezone";
pub const FIELD_PRICING: &str = "pricing";
pub const FIELD_AGE_GROUPS: &str = "ageGroups";
pub const FIELD_REGISTRATION_URL: &str = "registrationURL";
pub const FIELD_TAGS: &str = "tags";

/// Field name used for payload-level issues that belong to no single record.
pub const FIELD_ROOT: &str = "<root>";

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Container keys tried, in priority order, when locating the record array.
pub const DEFAULT_CONTAINER_KEYS: [&str; 6] =
    ["events", "activities", "venues", "items", "data", "results"];

/// Schema types the upstream extractor can be asked for.
pub const SCHEMA_EVENTS: &str = "events";
pub const SCHEMA_CLASSES: &str = "classes";
pub const SCHEMA_VENUES: &str = "venues";

/// All fields an Activity can carry, required first.
pub fn activity_fields() -> Vec<&'static str> {
    vec![
        FIELD_TITLE,
        FIELD_LOCATION,
        FIELD_LOCATION_ADDRESS,
        FIELD_DESCRIPTION,
        FIELD_START_DATE,
        FIELD_START_TIME,
        FIELD_END_TIME,
        FIELD_TIMEZONE,
        FIELD_PRICING,
        FIELD_AGE_GROUPS,
        FIELD_REGISTRATION_URL,
        FIELD_TAGS,
    ]
}
