/// Field and table names shared by the cleaner, the stores and reporting.
/// Reporting queries depend on these names, so they are fixed here.

// Raw feed field names
pub const FIELD_ID: &str = "id";
pub const FIELD_DISRUPTION_ID: &str = "disruption_id";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_START: &str = "start";
pub const FIELD_END: &str = "end";
pub const FIELD_SECTION: &str = "section";
pub const FIELD_TIMESPANS: &str = "timespans";

// Tables
pub const RAW_TABLE: &str = "raw_disruptions";
pub const NORMALIZED_TABLE: &str = "disruptions";

/// Canonical column list of the normalized table, in storage order.
pub const CANONICAL_COLUMNS: [&str; 12] = [
    "disruption_id",
    "type",
    "title",
    "description",
    "start_time",
    "end_time",
    "duration_minutes",
    "impact_level",
    "affected_stations",
    "is_resolved",
    "created_at",
    "updated_at",
];

/// SQLite-friendly UTC timestamp layout so `DATE()` works in reporting queries.
/// Microseconds keep two writes in the same second distinguishable.
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Accepts stored text with or without the fractional part
pub const SQL_TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// Canonical type labels
pub const TYPE_DISRUPTION: &str = "disruption";
pub const TYPE_MAINTENANCE: &str = "maintenance";
pub const TYPE_CALAMITY: &str = "calamity";

/// Source label -> canonical label, applied after lower-casing.
pub const DEFAULT_TYPE_MAPPING: [(&str, &str); 4] = [
    ("verstoring", TYPE_DISRUPTION),
    ("werkzaamheden", TYPE_MAINTENANCE),
    ("calamiteit", TYPE_CALAMITY),
    ("storing", TYPE_DISRUPTION),
];

pub const MIN_IMPACT_LEVEL: u8 = 1;
pub const MAX_IMPACT_LEVEL: u8 = 5;

/// Upper bound for the provisional end-time horizon (one year)
pub const MAX_ONGOING_HORIZON_HOURS: i64 = 8760;

// Environment variables
pub const ENV_API_KEY: &str = "NS_API_KEY";
pub const ENV_DATABASE_PATH: &str = "NS_DATABASE_PATH";
pub const ENV_FEED_BASE_URL: &str = "NS_API_BASE_URL";

pub const DEFAULT_FEED_BASE_URL: &str = "https://gateway.apiportal.ns.nl/reisinformatie-api/api/v3";
pub const DEFAULT_DATABASE_PATH: &str = "data/ns_rail.db";
pub const DEFAULT_MIRROR_DIR: &str = "data/raw";
pub const DEFAULT_PROCESSED_DIR: &str = "data/processed";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
