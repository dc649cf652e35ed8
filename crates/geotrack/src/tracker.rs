//! The location state engine.
//!
//! [`Tracker`] ties the pieces together: a report writes straight to the
//! location store, and a listing first refreshes every device's nearest
//! landmark and then applies the caller's visibility.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::access;
use crate::error::Result;
use crate::model::{Caller, LocationRecord, LocationReport, ReportInput};
use crate::resolver::{self, ResolveStats};
use crate::storage::Storage;

/// Engine facade over one storage connection.
///
/// A `Tracker` is not shared between threads; each concurrent handler opens
/// its own on the same database file.
#[derive(Debug)]
pub struct Tracker {
    storage: Storage,
}

impl Tracker {
    /// Wrap an already opened storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Open a tracker on the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        Ok(Self::new(Storage::open_with_busy_timeout(path, busy_timeout)?))
    }

    /// The underlying storage, for administrative operations.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Validate raw report fields and record the position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the fields are malformed, or
    /// a storage error if the write fails.
    pub fn report(&self, input: &ReportInput) -> Result<LocationRecord> {
        let report = input.validate()?;
        self.record(&report)
    }

    /// Record an already validated position report.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record(&self, report: &LocationReport) -> Result<LocationRecord> {
        let record = self.storage.upsert_location(report)?;
        info!("Location report from {}", record.device_id);
        Ok(record)
    }

    /// Refresh the nearest-landmark label of every device.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot read or write the store.
    pub fn resolve_all(&self) -> Result<ResolveStats> {
        resolver::resolve_all(&self.storage)
    }

    /// The records visible to `caller`, without refreshing labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn visible_devices(&self, caller: &Caller) -> Result<Vec<LocationRecord>> {
        access::visible_devices(&self.storage, caller)
    }

    /// Refresh labels, then return the records visible to `caller`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolver pass or the read fails.
    pub fn list(&self, caller: &Caller) -> Result<Vec<LocationRecord>> {
        let stats = self.resolve_all()?;
        debug!("Listing for {} after resolving {} device(s)", caller.role(), stats.devices);
        self.visible_devices(caller)
    }
}
