//! `SQLite` schema definitions for geotrack.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the locations table (one row per device).
pub const CREATE_LOCATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS locations (
    device_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    nearest_landmark TEXT,
    battery TEXT NOT NULL DEFAULT '',
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create an index on timestamp for listing order.
pub const CREATE_LOCATIONS_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_locations_timestamp ON locations(timestamp DESC)
";

/// SQL statement to create the landmark catalog table.
pub const CREATE_LANDMARKS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS landmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL
)
";

/// SQL statement to create the officers table.
pub const CREATE_OFFICERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS officers (
    officer_id TEXT PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    contact TEXT NOT NULL DEFAULT '',
    device_name TEXT NOT NULL DEFAULT '',
    device_contact TEXT NOT NULL DEFAULT ''
)
";

/// SQL statement to create the allotments table.
///
/// No foreign keys: officers and devices may be removed independently.
pub const CREATE_ALLOTMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS allotments (
    officer_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    PRIMARY KEY (officer_id, device_id)
)
";

/// SQL statement to create an index on `device_id` for reverse lookups.
pub const CREATE_ALLOTMENTS_DEVICE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_allotments_device ON allotments(device_id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_LOCATIONS_TABLE,
    CREATE_LOCATIONS_TIMESTAMP_INDEX,
    CREATE_LANDMARKS_TABLE,
    CREATE_OFFICERS_TABLE,
    CREATE_ALLOTMENTS_TABLE,
    CREATE_ALLOTMENTS_DEVICE_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_locations_keyed_by_device() {
        assert!(CREATE_LOCATIONS_TABLE.contains("device_id TEXT PRIMARY KEY"));
        assert!(CREATE_LOCATIONS_TABLE.contains("nearest_landmark TEXT,"));
        assert!(CREATE_LOCATIONS_TABLE.contains("timestamp TEXT NOT NULL"));
    }

    #[test]
    fn test_allotments_composite_key() {
        assert!(CREATE_ALLOTMENTS_TABLE.contains("PRIMARY KEY (officer_id, device_id)"));
        assert!(!CREATE_ALLOTMENTS_TABLE.contains("REFERENCES"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
