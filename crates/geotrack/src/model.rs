//! Core record types for geotrack.
//!
//! This module defines the data model shared by the storage layer, the
//! nearest-landmark resolver and the access filter: landmarks, per-device
//! location records, officers and their device allotments, plus the
//! caller identity and validated location reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{self, Coordinate};

/// A named reference point used to label device positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Identifier assigned by the storage layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Display name; not required to be unique.
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Landmark {
    /// Create an unsaved landmark.
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// The landmark position, or `None` if its coordinates are malformed.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The latest known position of one device.
///
/// `nearest_landmark` is derived state: it reflects the last resolver pass and
/// may lag behind the most recent report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Unique device identifier.
    pub device_id: String,
    /// Human-readable device name.
    pub display_name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Name of the closest landmark as of the last resolver pass.
    pub nearest_landmark: Option<String>,
    /// Battery level as reported by the device.
    pub battery: String,
    /// Server time at which the last report was written.
    pub timestamp: DateTime<Utc>,
}

impl LocationRecord {
    /// The device position, or `None` if the stored coordinates are malformed.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Identity metadata for a restricted-visibility account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    /// Unique officer identifier.
    pub officer_id: String,
    /// Officer name.
    pub name: String,
    /// Officer contact details.
    pub contact: String,
    /// Name of the device the officer carries.
    pub device_name: String,
    /// Contact details for that device.
    pub device_contact: String,
}

/// Grants one officer visibility of one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allotment {
    /// The officer receiving visibility.
    pub officer_id: String,
    /// The device made visible.
    pub device_id: String,
}

impl Allotment {
    /// Create an allotment pair.
    #[must_use]
    pub fn new(officer_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            officer_id: officer_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// The role a caller acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and edits every record.
    Admin,
    /// Sees only allotted devices.
    Officer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Officer => write!(f, "officer"),
        }
    }
}

/// An authenticated caller, passed explicitly into every access decision.
///
/// There is no unauthenticated variant: whoever builds a `Caller` has already
/// established the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Caller {
    /// Unrestricted administrator.
    Admin,
    /// Officer restricted to their allotted devices.
    Officer {
        /// Identifier used to look up allotments.
        officer_id: String,
    },
}

impl Caller {
    /// An administrator caller.
    #[must_use]
    pub fn admin() -> Self {
        Self::Admin
    }

    /// An officer caller with the given identifier.
    #[must_use]
    pub fn officer(officer_id: impl Into<String>) -> Self {
        Self::Officer {
            officer_id: officer_id.into(),
        }
    }

    /// The caller's role.
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::Officer { .. } => Role::Officer,
        }
    }
}

/// Raw report fields as received from an ingestion collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportInput {
    /// Device identifier.
    pub device_id: Option<String>,
    /// Latitude, unparsed.
    pub latitude: Option<String>,
    /// Longitude, unparsed.
    pub longitude: Option<String>,
    /// Battery level.
    pub battery: Option<String>,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl ReportInput {
    /// Parse and validate the raw fields into a [`LocationReport`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the device id is missing or blank,
    /// or when latitude/longitude are missing, unparseable or out of range.
    pub fn validate(&self) -> Result<LocationReport> {
        let device_id = self
            .device_id
            .as_deref()
            .ok_or_else(|| Error::invalid_input("device_id", "missing"))?;
        let latitude = parse_degrees("latitude", self.latitude.as_deref())?;
        let longitude = parse_degrees("longitude", self.longitude.as_deref())?;

        LocationReport::new(
            device_id,
            latitude,
            longitude,
            self.battery.clone(),
            self.display_name.clone(),
        )
    }
}

fn parse_degrees(field: &'static str, raw: Option<&str>) -> Result<f64> {
    let raw = raw.ok_or_else(|| Error::invalid_input(field, "missing"))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::invalid_input(field, format!("expected a number, got '{raw}'")))
}

/// A validated location report, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    /// Device identifier (non-blank).
    pub device_id: String,
    /// Reported position.
    pub coordinate: Coordinate,
    /// Battery level; empty when the device did not send one.
    pub battery: String,
    /// Display name; `None` keeps the stored name.
    pub display_name: Option<String>,
}

impl LocationReport {
    /// Validate typed report fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the device id is blank or the
    /// coordinates are not finite or out of range.
    pub fn new(
        device_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        battery: Option<String>,
        display_name: Option<String>,
    ) -> Result<Self> {
        let device_id = device_id.into().trim().to_string();
        if device_id.is_empty() {
            return Err(Error::invalid_input("device_id", "must not be blank"));
        }
        if !geo::is_valid_latitude(latitude) {
            return Err(Error::invalid_input(
                "latitude",
                format!("{latitude} is outside [-90, 90]"),
            ));
        }
        if !geo::is_valid_longitude(longitude) {
            return Err(Error::invalid_input(
                "longitude",
                format!("{longitude} is outside [-180, 180]"),
            ));
        }

        Ok(Self {
            device_id,
            coordinate: Coordinate {
                latitude,
                longitude,
            },
            battery: battery.unwrap_or_default(),
            display_name: display_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
    }
}
