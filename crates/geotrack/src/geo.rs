//! Great-circle distance between coordinates.
//!
//! Distances use the haversine formula on a spherical Earth, which is accurate
//! to well under one percent for the proximity labelling done here.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, within `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, returning `None` when either component is not
    /// finite or lies outside its valid range.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if is_valid_latitude(latitude) && is_valid_longitude(longitude) {
            Some(Self {
                latitude,
                longitude,
            })
        } else {
            None
        }
    }

    /// Distance to another coordinate in kilometers.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Check that a latitude is finite and within `[-90, 90]`.
#[must_use]
pub fn is_valid_latitude(latitude: f64) -> bool {
    latitude.is_finite() && (-90.0..=90.0).contains(&latitude)
}

/// Check that a longitude is finite and within `[-180, 180]`.
#[must_use]
pub fn is_valid_longitude(longitude: f64) -> bool {
    longitude.is_finite() && (-180.0..=180.0).contains(&longitude)
}

/// Haversine distance between two points in kilometers.
///
/// All inputs in degrees. Identical points yield exactly `0.0`, and the
/// inverse-sine argument is clamped so rounding near antipodal points cannot
/// leave its domain.
#[must_use]
pub fn distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let dlat = (lat_b - lat_a).to_radians();
    let dlon = (lon_b - lon_a).to_radians();
    let lat_a = lat_a.to_radians();
    let lat_b = lat_b.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().clamp(-1.0, 1.0).asin();
    EARTH_RADIUS_KM * c
}
