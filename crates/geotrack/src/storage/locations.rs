//! Location repository: one row per device, last write wins.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use super::{format_timestamp, parse_timestamp, real_column, Storage};
use crate::error::Result;
use crate::model::{LocationRecord, LocationReport};

const LOCATION_COLUMNS: &str =
    "device_id, display_name, latitude, longitude, nearest_landmark, battery, timestamp";

// One statement inside an immediate transaction keeps each report atomic:
// concurrent reports for the same device are serialized by SQLite and the
// last commit supersedes every mutable field. nearest_landmark is left alone
// on update.
const UPSERT_LOCATION_SQL: &str = r"
INSERT INTO locations (device_id, display_name, latitude, longitude, nearest_landmark, battery, timestamp)
VALUES (?1, COALESCE(?2, ?1), ?3, ?4, NULL, ?5, ?6)
ON CONFLICT(device_id) DO UPDATE SET
    display_name = COALESCE(?2, locations.display_name),
    latitude = excluded.latitude,
    longitude = excluded.longitude,
    battery = excluded.battery,
    timestamp = excluded.timestamp
RETURNING device_id, display_name, latitude, longitude, nearest_landmark, battery, timestamp
";

impl Storage {
    /// Insert or update the location record for the reporting device.
    ///
    /// The timestamp is read once the write lock is held, so a report that
    /// commits later never carries an earlier time than the one it replaced.
    /// A new device starts without a nearest landmark; an existing one keeps
    /// its previous assignment until the next resolver pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert_location(&self, report: &LocationReport) -> Result<LocationRecord> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let timestamp = format_timestamp(Utc::now());

        let record = tx.query_row(
            UPSERT_LOCATION_SQL,
            params![
                report.device_id,
                report.display_name,
                report.coordinate.latitude,
                report.coordinate.longitude,
                report.battery,
                timestamp,
            ],
            row_to_location,
        )?;
        tx.commit()?;

        debug!(
            "Stored location for {} at ({}, {})",
            record.device_id, record.latitude, record.longitude
        );
        Ok(record)
    }

    /// Get the location record for a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_location(&self, device_id: &str) -> Result<Option<LocationRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE device_id = ?1"),
                [device_id],
                row_to_location,
            )
            .optional()?;
        Ok(record)
    }

    /// List every location record, most recent report first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_locations(&self) -> Result<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY timestamp DESC, device_id"
        ))?;

        let records = stmt
            .query_map([], row_to_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// List the location records of devices allotted to an officer, most
    /// recent report first.
    ///
    /// Allotments naming devices that have no location record are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_locations_for_officer(&self, officer_id: &str) -> Result<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT l.device_id, l.display_name, l.latitude, l.longitude,
                   l.nearest_landmark, l.battery, l.timestamp
            FROM locations l
            JOIN allotments a ON a.device_id = l.device_id
            WHERE a.officer_id = ?1
            ORDER BY l.timestamp DESC, l.device_id
            ",
        )?;

        let records = stmt
            .query_map([officer_id], row_to_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count devices with a location record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_locations(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Record the nearest landmark for one device.
    ///
    /// Returns `true` if the stored value changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_nearest_landmark(&self, device_id: &str, landmark: &str) -> Result<bool> {
        let affected = self.conn.execute(
            r"
            UPDATE locations SET nearest_landmark = ?2
            WHERE device_id = ?1 AND nearest_landmark IS NOT ?2
            ",
            params![device_id, landmark],
        )?;
        Ok(affected > 0)
    }

    /// Delete the location record of a device.
    ///
    /// Allotments naming the device are kept. Returns `true` if a record was
    /// deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_location(&self, device_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM locations WHERE device_id = ?1", [device_id])?;
        Ok(affected > 0)
    }
}

fn row_to_location(row: &Row) -> rusqlite::Result<LocationRecord> {
    let timestamp: String = row.get(6)?;

    Ok(LocationRecord {
        device_id: row.get(0)?,
        display_name: row.get(1)?,
        latitude: real_column(row, 2)?,
        longitude: real_column(row, 3)?,
        nearest_landmark: row.get(4)?,
        battery: row.get(5)?,
        timestamp: parse_timestamp(&timestamp),
    })
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::model::Allotment;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn report(device_id: &str, lat: f64, lon: f64, battery: &str) -> LocationReport {
        LocationReport::new(device_id, lat, lon, Some(battery.to_string()), None).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let storage = create_test_storage();
        let stored = storage.upsert_location(&report("x1", 1.0, 2.0, "80%")).unwrap();

        assert_eq!(stored.device_id, "x1");
        assert_eq!(stored.display_name, "x1");
        assert!(stored.nearest_landmark.is_none());

        let loaded = storage.get_location("x1").unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[test]
    fn test_second_report_replaces_in_place() {
        let storage = create_test_storage();
        storage.upsert_location(&report("x1", 1.0, 1.0, "80%")).unwrap();
        storage.upsert_location(&report("x1", 2.0, 2.0, "75%")).unwrap();

        assert_eq!(storage.count_locations().unwrap(), 1);
        let loaded = storage.get_location("x1").unwrap().unwrap();
        assert_eq!(loaded.latitude, 2.0);
        assert_eq!(loaded.longitude, 2.0);
        assert_eq!(loaded.battery, "75%");
    }

    #[test]
    fn test_timestamp_advances_on_update() {
        let storage = create_test_storage();
        let first = storage.upsert_location(&report("x1", 1.0, 1.0, "80%")).unwrap();
        thread::sleep(Duration::from_millis(2));
        let second = storage.upsert_location(&report("x1", 1.0, 1.0, "80%")).unwrap();

        assert!(second.timestamp > first.timestamp);
    }

    #[test]
    fn test_timestamp_taken_after_waiting_for_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geotrack.db");
        let holder = Storage::open(&path).unwrap();
        let writer = Storage::open_with_busy_timeout(&path, Duration::from_secs(10)).unwrap();

        holder.conn.execute_batch("BEGIN IMMEDIATE").unwrap();
        let pending =
            thread::spawn(move || writer.upsert_location(&report("x1", 1.0, 1.0, "")).unwrap());
        thread::sleep(Duration::from_millis(200));
        let released_at = Utc::now();
        holder.conn.execute_batch("COMMIT").unwrap();

        let stored = pending.join().unwrap();
        assert!(stored.timestamp.timestamp_micros() >= released_at.timestamp_micros());
    }

    #[test]
    fn test_update_keeps_nearest_landmark_until_resolved() {
        let storage = create_test_storage();
        storage.upsert_location(&report("x1", 1.0, 1.0, "80%")).unwrap();
        assert!(storage.set_nearest_landmark("x1", "Depot").unwrap());

        let updated = storage.upsert_location(&report("x1", 5.0, 5.0, "70%")).unwrap();
        assert_eq!(updated.nearest_landmark.as_deref(), Some("Depot"));
    }

    #[test]
    fn test_display_name_defaults_and_persists() {
        let storage = create_test_storage();
        let named = LocationReport::new("x1", 0.0, 0.0, None, Some("Van 7".to_string())).unwrap();
        storage.upsert_location(&named).unwrap();

        // A later report without a name keeps the stored one
        let stored = storage.upsert_location(&report("x1", 1.0, 1.0, "")).unwrap();
        assert_eq!(stored.display_name, "Van 7");

        let renamed = LocationReport::new("x1", 1.0, 1.0, None, Some("Van 8".to_string())).unwrap();
        let stored = storage.upsert_location(&renamed).unwrap();
        assert_eq!(stored.display_name, "Van 8");
    }

    #[test]
    fn test_missing_battery_overwrites_previous() {
        let storage = create_test_storage();
        storage.upsert_location(&report("x1", 1.0, 1.0, "80%")).unwrap();
        let bare = LocationReport::new("x1", 1.0, 1.0, None, None).unwrap();
        let stored = storage.upsert_location(&bare).unwrap();
        assert_eq!(stored.battery, "");
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get_location("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_orders_most_recent_first() {
        let storage = create_test_storage();
        storage.upsert_location(&report("a", 0.0, 0.0, "")).unwrap();
        thread::sleep(Duration::from_millis(2));
        storage.upsert_location(&report("b", 0.0, 0.0, "")).unwrap();

        let ids: Vec<String> = storage
            .list_locations()
            .unwrap()
            .into_iter()
            .map(|r| r.device_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_list_for_officer_joins_allotments() {
        let storage = create_test_storage();
        storage.upsert_location(&report("x1", 0.0, 0.0, "")).unwrap();
        storage.upsert_location(&report("x2", 0.0, 0.0, "")).unwrap();
        storage.allot(&Allotment::new("off1", "x1")).unwrap();
        storage.allot(&Allotment::new("off1", "ghost")).unwrap();
        storage.allot(&Allotment::new("off2", "x2")).unwrap();

        let visible = storage.list_locations_for_officer("off1").unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].device_id, "x1");

        assert!(storage.list_locations_for_officer("off3").unwrap().is_empty());
    }

    #[test]
    fn test_set_nearest_landmark_reports_change() {
        let storage = create_test_storage();
        storage.upsert_location(&report("x1", 0.0, 0.0, "")).unwrap();

        assert!(storage.set_nearest_landmark("x1", "A").unwrap());
        assert!(!storage.set_nearest_landmark("x1", "A").unwrap());
        assert!(storage.set_nearest_landmark("x1", "B").unwrap());
        assert!(!storage.set_nearest_landmark("missing", "A").unwrap());
    }

    #[test]
    fn test_remove_location() {
        let storage = create_test_storage();
        storage.upsert_location(&report("x1", 0.0, 0.0, "")).unwrap();
        storage.allot(&Allotment::new("off1", "x1")).unwrap();

        assert!(storage.remove_location("x1").unwrap());
        assert!(!storage.remove_location("x1").unwrap());
        assert!(storage.get_location("x1").unwrap().is_none());
        // No cascade into allotments
        assert_eq!(storage.list_allotments(Some("off1")).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_coordinates_read_as_nan() {
        let storage = create_test_storage();
        storage
            .conn
            .execute(
                "INSERT INTO locations (device_id, display_name, latitude, longitude, battery, timestamp)
                 VALUES ('bad', 'bad', 'north', 0.0, '', '2024-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap();

        let record = storage.get_location("bad").unwrap().unwrap();
        assert!(record.latitude.is_nan());
        assert!(record.coordinate().is_none());
    }
}
