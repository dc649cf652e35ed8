//! `geotrack` - A location state engine for tracked devices
//!
//! This library keeps the latest reported position of every device, labels
//! each device with its nearest landmark, and restricts officers to the
//! devices allotted to them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod access;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod geo;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod storage;
pub mod tracker;

pub use api::{ApiResponse, DeviceView, IngestParams};
pub use config::Config;
pub use error::{Error, Result};
pub use geo::Coordinate;
pub use logging::init_logging;
pub use model::{
    Allotment, Caller, Landmark, LocationRecord, LocationReport, Officer, ReportInput, Role,
};
pub use resolver::ResolveStats;
pub use storage::{Storage, StorageStats};
pub use tracker::Tracker;
