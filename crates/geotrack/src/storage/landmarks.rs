//! Landmark catalog repository.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{real_column, Storage};
use crate::error::{Error, Result};
use crate::model::Landmark;

impl Storage {
    /// Add a landmark to the catalog and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name is blank or the coordinates
    /// are out of range, or an error if the database operation fails.
    pub fn add_landmark(&self, landmark: &Landmark) -> Result<i64> {
        let name = landmark.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("name", "must not be blank"));
        }
        if landmark.coordinate().is_none() {
            return Err(Error::invalid_input(
                "coordinates",
                format!(
                    "({}, {}) is not a valid position",
                    landmark.latitude, landmark.longitude
                ),
            ));
        }

        self.conn.execute(
            "INSERT INTO landmarks (name, latitude, longitude) VALUES (?1, ?2, ?3)",
            params![name, landmark.latitude, landmark.longitude],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Added landmark '{}' with id {}", name, id);
        Ok(id)
    }

    /// Get a landmark by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_landmark(&self, id: i64) -> Result<Option<Landmark>> {
        let landmark = self
            .conn
            .query_row(
                "SELECT id, name, latitude, longitude FROM landmarks WHERE id = ?1",
                [id],
                row_to_landmark,
            )
            .optional()?;
        Ok(landmark)
    }

    /// Load the whole catalog in iteration order (ascending id).
    ///
    /// The catalog is read by one statement, so a resolver pass sees a
    /// consistent snapshot. Rows with malformed coordinates are returned with
    /// NaN components for the caller to skip.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_landmarks(&self) -> Result<Vec<Landmark>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, latitude, longitude FROM landmarks ORDER BY id")?;

        let landmarks = stmt
            .query_map([], row_to_landmark)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(landmarks)
    }

    /// Remove a landmark from the catalog.
    ///
    /// Devices labelled with it keep the name until the next resolver pass.
    /// Returns `true` if a landmark was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_landmark(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM landmarks WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

fn row_to_landmark(row: &Row) -> rusqlite::Result<Landmark> {
    Ok(Landmark {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        latitude: real_column(row, 2)?,
        longitude: real_column(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_add_and_get() {
        let storage = create_test_storage();
        let id = storage.add_landmark(&Landmark::new(" Depot ", 10.0, 20.0)).unwrap();

        let landmark = storage.get_landmark(id).unwrap().unwrap();
        assert_eq!(landmark.id, Some(id));
        assert_eq!(landmark.name, "Depot");
        assert_eq!(landmark.latitude, 10.0);
        assert_eq!(landmark.longitude, 20.0);
    }

    #[test]
    fn test_add_rejects_invalid() {
        let storage = create_test_storage();
        assert!(storage
            .add_landmark(&Landmark::new("", 0.0, 0.0))
            .unwrap_err()
            .is_invalid_input());
        assert!(storage
            .add_landmark(&Landmark::new("Nowhere", 95.0, 0.0))
            .unwrap_err()
            .is_invalid_input());
        assert!(storage.list_landmarks().unwrap().is_empty());
    }

    #[test]
    fn test_list_in_id_order_with_duplicate_names() {
        let storage = create_test_storage();
        storage.add_landmark(&Landmark::new("Gate", 0.0, 0.0)).unwrap();
        storage.add_landmark(&Landmark::new("Gate", 1.0, 1.0)).unwrap();
        storage.add_landmark(&Landmark::new("Tower", 2.0, 2.0)).unwrap();

        let landmarks = storage.list_landmarks().unwrap();
        let ids: Vec<i64> = landmarks.iter().filter_map(|l| l.id).collect();
        assert_eq!(landmarks.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(landmarks[0].name, "Gate");
        assert_eq!(landmarks[1].name, "Gate");
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        let id = storage.add_landmark(&Landmark::new("A", 0.0, 0.0)).unwrap();

        assert!(storage.remove_landmark(id).unwrap());
        assert!(!storage.remove_landmark(id).unwrap());
        assert!(storage.get_landmark(id).unwrap().is_none());
    }
}
