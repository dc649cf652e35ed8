//! Transport-neutral request handlers.
//!
//! An HTTP layer (or anything else) decodes its request into the types here,
//! calls a handler, and writes back the returned status and JSON body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::Error;
use crate::model::{Caller, LocationRecord, ReportInput};
use crate::tracker::Tracker;

/// Query or form parameters of an ingestion request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestParams {
    /// Device identifier.
    pub id: Option<String>,
    /// Latitude in degrees.
    pub lat: Option<String>,
    /// Longitude in degrees.
    pub lon: Option<String>,
    /// Battery level.
    pub battery: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

impl From<&IngestParams> for ReportInput {
    fn from(params: &IngestParams) -> Self {
        Self {
            device_id: params.id.clone(),
            latitude: params.lat.clone(),
            longitude: params.lon.clone(),
            battery: params.battery.clone(),
            display_name: params.name.clone(),
        }
    }
}

/// A handler result: an HTTP-style status code and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Value,
}

impl ApiResponse {
    fn success() -> Self {
        Self {
            status: 200,
            body: json!({ "status": "success" }),
        }
    }

    fn from_error(err: &Error) -> Self {
        let status = match err {
            Error::InvalidInput { .. } => 400,
            _ if err.is_storage_unavailable() => 503,
            _ => 500,
        };
        if status == 500 {
            error!("Request failed: {}", err);
        } else {
            warn!("Request rejected: {}", err);
        }

        Self {
            status,
            body: json!({ "status": "error", "message": err.to_string() }),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One device as presented to a listing caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    /// Unique device identifier.
    pub device_id: String,
    /// Human-readable device name.
    pub display_name: String,
    /// Latitude in degrees; `null` when the stored value is unreadable.
    #[serde(deserialize_with = "nan_from_null")]
    pub latitude: f64,
    /// Longitude in degrees; `null` when the stored value is unreadable.
    #[serde(deserialize_with = "nan_from_null")]
    pub longitude: f64,
    /// Closest landmark as of the last resolver pass.
    pub nearest_landmark: Option<String>,
    /// Reported battery level.
    pub battery: String,
    /// Time of the last report.
    pub timestamp: DateTime<Utc>,
}

// serde_json writes NaN as null
fn nan_from_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl From<LocationRecord> for DeviceView {
    fn from(record: LocationRecord) -> Self {
        Self {
            device_id: record.device_id,
            display_name: record.display_name,
            latitude: record.latitude,
            longitude: record.longitude,
            nearest_landmark: record.nearest_landmark,
            battery: record.battery,
            timestamp: record.timestamp,
        }
    }
}

/// Handle a location report.
///
/// Returns 200 on success, 400 for malformed parameters, 503 when the
/// store is unavailable and 500 for anything else.
#[must_use]
pub fn ingest(tracker: &Tracker, params: &IngestParams) -> ApiResponse {
    match tracker.report(&ReportInput::from(params)) {
        Ok(_) => ApiResponse::success(),
        Err(err) => ApiResponse::from_error(&err),
    }
}

/// Handle a listing request: refresh labels, then return the caller's view
/// as a JSON array of [`DeviceView`].
#[must_use]
pub fn list(tracker: &Tracker, caller: &Caller) -> ApiResponse {
    let result = tracker.list(caller).and_then(|records| {
        let views: Vec<DeviceView> = records.into_iter().map(DeviceView::from).collect();
        Ok(serde_json::to_value(views)?)
    });

    match result {
        Ok(body) => ApiResponse { status: 200, body },
        Err(err) => ApiResponse::from_error(&err),
    }
}
