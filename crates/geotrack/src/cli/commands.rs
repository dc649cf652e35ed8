//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::model::{Allotment, Caller, Officer};

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Device identifier
    pub device_id: String,

    /// Latitude in degrees
    #[arg(allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude in degrees
    #[arg(allow_negative_numbers = true)]
    pub longitude: f64,

    /// Battery level as reported by the device
    #[arg(short, long)]
    pub battery: Option<String>,

    /// Display name for the device
    #[arg(short, long)]
    pub name: Option<String>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// List as this officer instead of as administrator
    #[arg(short, long, value_name = "OFFICER_ID")]
    pub officer: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ListCommand {
    /// The caller this listing runs as.
    #[must_use]
    pub fn caller(&self) -> Caller {
        self.officer
            .as_ref()
            .map_or_else(Caller::admin, Caller::officer)
    }
}

/// Resolve command arguments.
#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// Output statistics as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Landmark catalog commands.
#[derive(Debug, Subcommand)]
pub enum LandmarkCommand {
    /// Add a landmark
    Add {
        /// Landmark name
        name: String,
        /// Latitude in degrees
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        /// Longitude in degrees
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },

    /// List the catalog
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove a landmark by id
    Remove {
        /// Landmark id
        id: i64,
    },
}

/// Officer commands.
#[derive(Debug, Subcommand)]
pub enum OfficerCommand {
    /// Register an officer
    Add(OfficerArgs),

    /// List officers
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove an officer (allotments are kept)
    Remove {
        /// Officer id
        officer_id: String,
    },
}

/// Officer details.
#[derive(Debug, Args)]
pub struct OfficerArgs {
    /// Officer id
    pub officer_id: String,

    /// Officer name
    #[arg(short, long, default_value = "")]
    pub name: String,

    /// Officer contact details
    #[arg(long, default_value = "")]
    pub contact: String,

    /// Name of the device the officer carries
    #[arg(long, default_value = "")]
    pub device_name: String,

    /// Contact details for that device
    #[arg(long, default_value = "")]
    pub device_contact: String,
}

impl From<OfficerArgs> for Officer {
    fn from(args: OfficerArgs) -> Self {
        Self {
            officer_id: args.officer_id,
            name: args.name,
            contact: args.contact,
            device_name: args.device_name,
            device_contact: args.device_contact,
        }
    }
}

/// Allotment commands.
#[derive(Debug, Subcommand)]
pub enum AllotCommand {
    /// Allot a device to an officer
    Add(AllotmentArgs),

    /// Withdraw a device from an officer
    Remove(AllotmentArgs),

    /// List allotments
    List {
        /// Only this officer's allotments
        #[arg(short, long, value_name = "OFFICER_ID")]
        officer: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete allotments naming unknown officers or devices
    Prune,
}

/// An officer/device pair.
#[derive(Debug, Args)]
pub struct AllotmentArgs {
    /// Officer id
    pub officer_id: String,

    /// Device id
    pub device_id: String,
}

impl From<&AllotmentArgs> for Allotment {
    fn from(args: &AllotmentArgs) -> Self {
        Self::new(args.officer_id.clone(), args.device_id.clone())
    }
}

/// Device commands.
#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// Delete a device's location record (allotments are kept)
    Remove {
        /// Device id
        device_id: String,
    },
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Directory receiving the history files
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Keep exporting on the configured interval until Ctrl-C
    #[arg(short, long)]
    pub watch: bool,

    /// Override the export interval in minutes (with --watch)
    #[arg(short, long, value_name = "MINUTES", requires = "watch")]
    pub interval: Option<u64>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
