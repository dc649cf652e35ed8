//! Officer and allotment repositories.
//!
//! Allotments are plain `(officer_id, device_id)` pairs with no foreign keys.
//! Removing an officer or a device leaves its allotments in place; they are
//! ignored by the access filter and only deleted by an explicit prune.

use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use super::Storage;
use crate::error::{Error, Result};
use crate::model::{Allotment, Officer};

impl Storage {
    /// Register a new officer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the id is blank or already taken, or
    /// an error if the database operation fails.
    pub fn add_officer(&self, officer: &Officer) -> Result<()> {
        let officer_id = officer.officer_id.trim();
        if officer_id.is_empty() {
            return Err(Error::invalid_input("officer_id", "must not be blank"));
        }

        let result = self.conn.execute(
            r"
            INSERT INTO officers (officer_id, name, contact, device_name, device_contact)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                officer_id,
                officer.name,
                officer.contact,
                officer.device_name,
                officer.device_contact,
            ],
        );

        match result {
            Ok(_) => {
                debug!("Added officer {}", officer_id);
                Ok(())
            }
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => Err(
                Error::invalid_input("officer_id", format!("'{officer_id}' already exists")),
            ),
            Err(err) => Err(err.into()),
        }
    }

    /// Get an officer by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_officer(&self, officer_id: &str) -> Result<Option<Officer>> {
        let officer = self
            .conn
            .query_row(
                r"
                SELECT officer_id, name, contact, device_name, device_contact
                FROM officers WHERE officer_id = ?1
                ",
                [officer_id],
                row_to_officer,
            )
            .optional()?;
        Ok(officer)
    }

    /// List all officers ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_officers(&self) -> Result<Vec<Officer>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT officer_id, name, contact, device_name, device_contact
            FROM officers ORDER BY officer_id
            ",
        )?;

        let officers = stmt
            .query_map([], row_to_officer)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(officers)
    }

    /// Remove an officer. Their allotments are left untouched.
    ///
    /// Returns `true` if an officer was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_officer(&self, officer_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM officers WHERE officer_id = ?1", [officer_id])?;
        Ok(affected > 0)
    }

    /// Allot a device to an officer.
    ///
    /// Neither side has to exist yet. Returns `true` if the pair is new.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either id is blank, or an error if
    /// the database operation fails.
    pub fn allot(&self, allotment: &Allotment) -> Result<bool> {
        let officer_id = allotment.officer_id.trim();
        let device_id = allotment.device_id.trim();
        if officer_id.is_empty() {
            return Err(Error::invalid_input("officer_id", "must not be blank"));
        }
        if device_id.is_empty() {
            return Err(Error::invalid_input("device_id", "must not be blank"));
        }

        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO allotments (officer_id, device_id) VALUES (?1, ?2)",
            params![officer_id, device_id],
        )?;
        Ok(affected > 0)
    }

    /// Withdraw a device from an officer.
    ///
    /// Ids are trimmed as in [`Storage::allot`]. Returns `true` if the pair
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn revoke(&self, allotment: &Allotment) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM allotments WHERE officer_id = ?1 AND device_id = ?2",
            params![allotment.officer_id.trim(), allotment.device_id.trim()],
        )?;
        Ok(affected > 0)
    }

    /// List allotments, optionally restricted to one officer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_allotments(&self, officer_id: Option<&str>) -> Result<Vec<Allotment>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT officer_id, device_id FROM allotments
            WHERE ?1 IS NULL OR officer_id = ?1
            ORDER BY officer_id, device_id
            ",
        )?;

        let allotments = stmt
            .query_map([officer_id], |row| {
                Ok(Allotment {
                    officer_id: row.get(0)?,
                    device_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(allotments)
    }

    /// The device ids allotted to an officer. Empty when there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn devices_for_officer(&self, officer_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT device_id FROM allotments WHERE officer_id = ?1 ORDER BY device_id",
        )?;

        let devices = stmt
            .query_map([officer_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(devices)
    }

    /// Delete allotments whose officer or device record no longer exists.
    ///
    /// This also removes allotments made in advance for devices that have
    /// not reported yet. Returns the number of pairs deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_orphaned_allotments(&self) -> Result<usize> {
        let affected = self.conn.execute(
            r"
            DELETE FROM allotments
            WHERE officer_id NOT IN (SELECT officer_id FROM officers)
               OR device_id NOT IN (SELECT device_id FROM locations)
            ",
            [],
        )?;

        if affected > 0 {
            info!("Pruned {} orphaned allotments", affected);
        }
        Ok(affected)
    }
}

fn row_to_officer(row: &Row) -> rusqlite::Result<Officer> {
    Ok(Officer {
        officer_id: row.get(0)?,
        name: row.get(1)?,
        contact: row.get(2)?,
        device_name: row.get(3)?,
        device_contact: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LocationReport;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn officer(id: &str) -> Officer {
        Officer {
            officer_id: id.to_string(),
            name: format!("Officer {id}"),
            contact: "555-0100".to_string(),
            device_name: "Radio".to_string(),
            device_contact: "555-0101".to_string(),
        }
    }

    #[test]
    fn test_add_and_get_officer() {
        let storage = create_test_storage();
        storage.add_officer(&officer("off1")).unwrap();

        let loaded = storage.get_officer("off1").unwrap().unwrap();
        assert_eq!(loaded, officer("off1"));
        assert!(storage.get_officer("off2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_officer_rejected() {
        let storage = create_test_storage();
        storage.add_officer(&officer("off1")).unwrap();

        let err = storage.add_officer(&officer("off1")).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_blank_officer_rejected() {
        let storage = create_test_storage();
        assert!(storage.add_officer(&officer("  ")).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_list_officers_sorted() {
        let storage = create_test_storage();
        storage.add_officer(&officer("off2")).unwrap();
        storage.add_officer(&officer("off1")).unwrap();

        let ids: Vec<String> = storage
            .list_officers()
            .unwrap()
            .into_iter()
            .map(|o| o.officer_id)
            .collect();
        assert_eq!(ids, vec!["off1", "off2"]);
    }

    #[test]
    fn test_remove_officer_keeps_allotments() {
        let storage = create_test_storage();
        storage.add_officer(&officer("off1")).unwrap();
        storage.allot(&Allotment::new("off1", "x1")).unwrap();

        assert!(storage.remove_officer("off1").unwrap());
        assert!(!storage.remove_officer("off1").unwrap());
        assert_eq!(storage.devices_for_officer("off1").unwrap(), vec!["x1"]);
    }

    #[test]
    fn test_allot_is_idempotent() {
        let storage = create_test_storage();
        assert!(storage.allot(&Allotment::new("off1", "x1")).unwrap());
        assert!(!storage.allot(&Allotment::new("off1", "x1")).unwrap());
        assert_eq!(storage.list_allotments(None).unwrap().len(), 1);
    }

    #[test]
    fn test_allot_rejects_blank_ids() {
        let storage = create_test_storage();
        assert!(storage.allot(&Allotment::new("", "x1")).is_err());
        assert!(storage.allot(&Allotment::new("off1", " ")).is_err());
    }

    #[test]
    fn test_revoke() {
        let storage = create_test_storage();
        storage.allot(&Allotment::new("off1", "x1")).unwrap();

        assert!(storage.revoke(&Allotment::new("off1", "x1")).unwrap());
        assert!(!storage.revoke(&Allotment::new("off1", "x1")).unwrap());
        assert!(storage.devices_for_officer("off1").unwrap().is_empty());
    }

    #[test]
    fn test_revoke_trims_like_allot() {
        let storage = create_test_storage();
        storage.allot(&Allotment::new(" off1 ", "x1 ")).unwrap();
        assert_eq!(storage.devices_for_officer("off1").unwrap(), vec!["x1"]);

        assert!(storage.revoke(&Allotment::new(" off1 ", "x1 ")).unwrap());
        assert!(storage.list_allotments(None).unwrap().is_empty());
    }

    #[test]
    fn test_list_allotments_filtered() {
        let storage = create_test_storage();
        storage.allot(&Allotment::new("off1", "x2")).unwrap();
        storage.allot(&Allotment::new("off1", "x1")).unwrap();
        storage.allot(&Allotment::new("off2", "x1")).unwrap();

        assert_eq!(storage.list_allotments(None).unwrap().len(), 3);
        assert_eq!(
            storage.list_allotments(Some("off1")).unwrap(),
            vec![Allotment::new("off1", "x1"), Allotment::new("off1", "x2")]
        );
        assert!(storage.list_allotments(Some("off9")).unwrap().is_empty());
    }

    #[test]
    fn test_prune_orphaned_allotments() {
        let storage = create_test_storage();
        storage.add_officer(&officer("off1")).unwrap();
        let report = LocationReport::new("x1", 0.0, 0.0, None, None).unwrap();
        storage.upsert_location(&report).unwrap();

        storage.allot(&Allotment::new("off1", "x1")).unwrap();
        storage.allot(&Allotment::new("off1", "ghost")).unwrap();
        storage.allot(&Allotment::new("gone", "x1")).unwrap();

        assert_eq!(storage.prune_orphaned_allotments().unwrap(), 2);
        assert_eq!(
            storage.list_allotments(None).unwrap(),
            vec![Allotment::new("off1", "x1")]
        );
        assert_eq!(storage.prune_orphaned_allotments().unwrap(), 0);
    }
}
