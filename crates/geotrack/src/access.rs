//! Role-scoped visibility of device locations.
//!
//! The caller is always an explicit argument. Allotments are read on every
//! call, so grants and revocations apply to the very next listing.

use tracing::debug;

use crate::error::Result;
use crate::model::{Caller, LocationRecord};
use crate::storage::Storage;

/// Return the location records `caller` is allowed to see.
///
/// Administrators see every record. Officers see only devices allotted to
/// them; an officer without allotments sees nothing.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn visible_devices(storage: &Storage, caller: &Caller) -> Result<Vec<LocationRecord>> {
    let records = match caller {
        Caller::Admin => storage.list_locations()?,
        Caller::Officer { officer_id } => storage.list_locations_for_officer(officer_id)?,
    };

    debug!("{} device(s) visible to {:?}", records.len(), caller);
    Ok(records)
}
