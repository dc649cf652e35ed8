//! Nearest-landmark resolution.
//!
//! A resolver pass loads the landmark catalog once, then labels every device
//! with the name of its closest landmark. The pass is a full recompute,
//! O(devices × landmarks), and is re-run before each listing so labels are at
//! most one pass stale. That is fine for fleets and catalogs in the tens to
//! low hundreds; beyond that the labels would need to be maintained
//! incrementally on report and catalog changes instead.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::geo::Coordinate;
use crate::model::Landmark;
use crate::storage::Storage;

/// Outcome of one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    /// Devices examined.
    pub devices: usize,
    /// Devices whose stored label changed.
    pub updated: usize,
    /// Devices skipped because their stored coordinates are malformed.
    pub skipped_devices: usize,
    /// Catalog entries skipped because their coordinates are malformed.
    pub skipped_landmarks: usize,
}

/// Find the landmark closest to `point`.
///
/// Entries are compared in slice order and only a strictly smaller distance
/// replaces the current best, so an exact tie keeps the earlier entry.
/// Entries with malformed coordinates are ignored. Returns `None` when no
/// entry is usable.
#[must_use]
pub fn nearest_landmark<'a>(point: &Coordinate, catalog: &'a [Landmark]) -> Option<&'a Landmark> {
    let mut best: Option<(&Landmark, f64)> = None;

    for landmark in catalog {
        let Some(position) = landmark.coordinate() else {
            continue;
        };
        let distance = point.distance_to(&position);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((landmark, distance)),
        }
    }

    best.map(|(landmark, _)| landmark)
}

/// Run one full resolver pass over every stored device.
///
/// With an empty catalog this does nothing and existing labels stay as they
/// are. Each device row is updated on its own, so reports written during
/// the pass are never blocked; such a device may keep a label that is one
/// pass stale.
///
/// # Errors
///
/// Returns an error if reading the catalog or the locations fails, or if a
/// label cannot be written.
pub fn resolve_all(storage: &Storage) -> Result<ResolveStats> {
    let catalog = storage.list_landmarks()?;
    let mut stats = ResolveStats {
        skipped_landmarks: catalog.iter().filter(|l| l.coordinate().is_none()).count(),
        ..ResolveStats::default()
    };

    if stats.skipped_landmarks > 0 {
        warn!(
            "Skipping {} landmark(s) with malformed coordinates",
            stats.skipped_landmarks
        );
    }
    if catalog.is_empty() {
        debug!("Landmark catalog is empty, nothing to resolve");
        return Ok(stats);
    }

    for record in storage.list_locations()? {
        stats.devices += 1;

        let Some(position) = record.coordinate() else {
            warn!(
                "Device {} has malformed coordinates ({}, {}), skipping",
                record.device_id, record.latitude, record.longitude
            );
            stats.skipped_devices += 1;
            continue;
        };

        let Some(nearest) = nearest_landmark(&position, &catalog) else {
            continue;
        };
        if record.nearest_landmark.as_deref() == Some(nearest.name.as_str()) {
            continue;
        }
        if storage.set_nearest_landmark(&record.device_id, &nearest.name)? {
            stats.updated += 1;
        }
    }

    debug!(
        "Resolver pass: {} devices, {} updated, {} devices skipped, {} landmarks skipped",
        stats.devices, stats.updated, stats.skipped_devices, stats.skipped_landmarks
    );
    Ok(stats)
}
