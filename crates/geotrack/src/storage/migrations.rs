//! Database migration system for geotrack.
//!
//! Schema versions are tracked in the `metadata` table. Version 2 upgrades
//! location tables created by the earlier tracking server, which only stored
//! `device_id`, `latitude`, `longitude` and `timestamp`.

use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;
use super::{format_timestamp, try_parse_timestamp};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Columns added to legacy `locations` tables, with their definitions.
const LEGACY_LOCATION_COLUMNS: &[(&str, &str)] = &[
    ("display_name", "TEXT NOT NULL DEFAULT ''"),
    ("nearest_landmark", "TEXT"),
    ("battery", "TEXT NOT NULL DEFAULT ''"),
];

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

/// Get the schema version recorded in the database.
///
/// Returns 0 if no version is set (fresh or legacy database).
///
/// # Errors
///
/// Returns an error if the stored version cannot be read or parsed.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => Ok(()),
        2 => migrate_v2(conn),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Add the columns missing from legacy `locations` tables.
///
/// Fresh databases already have every column, so this only alters tables
/// that predate the landmark and battery fields. Legacy rows get their
/// `device_id` as display name, and their offset-less timestamps are
/// rewritten in the stored UTC form.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let existing = table_columns(conn, "locations")?;
    let mut added = Vec::new();

    for (column, definition) in LEGACY_LOCATION_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            conn.execute(
                &format!("ALTER TABLE locations ADD COLUMN {column} {definition}"),
                [],
            )?;
            added.push(*column);
        }
    }

    if added.contains(&"display_name") {
        conn.execute(
            "UPDATE locations SET display_name = device_id WHERE display_name = ''",
            [],
        )?;
    }
    if !added.is_empty() {
        info!("Upgraded legacy locations table, added columns: {}", added.join(", "));
    }

    normalize_timestamps(conn)
}

/// Rewrite every location timestamp that is not already in stored form.
///
/// Values that cannot be parsed at all are left as they are.
fn normalize_timestamps(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT device_id, timestamp FROM locations")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rewritten = 0;
    for (device_id, raw) in rows {
        let Some(raw) = raw else {
            continue;
        };
        let Some(parsed) = try_parse_timestamp(&raw) else {
            warn!("Leaving unparseable timestamp '{}' on device {}", raw, device_id);
            continue;
        };
        let stored = format_timestamp(parsed);
        if stored != raw {
            conn.execute(
                "UPDATE locations SET timestamp = ?2 WHERE device_id = ?1",
                params![device_id, stored],
            )?;
            rewritten += 1;
        }
    }

    if rewritten > 0 {
        info!("Normalized {} legacy location timestamps", rewritten);
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}
