//! Command-line interface for geotrack.
//!
//! This module provides the CLI structure for the `geotrack` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AllotCommand, AllotmentArgs, ConfigCommand, DeviceCommand, ExportCommand, LandmarkCommand,
    ListCommand, OfficerArgs, OfficerCommand, OutputFormat, ReportCommand, ResolveCommand,
    StatusCommand,
};

/// geotrack - Track devices and label them by nearest landmark
///
/// Keeps the latest reported position of every device, names the closest
/// landmark to each one, and limits officers to the devices allotted to them.
#[derive(Debug, Parser)]
#[command(name = "geotrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a position report for a device
    Report(ReportCommand),

    /// Resolve nearest landmarks and list visible devices
    List(ListCommand),

    /// Run one nearest-landmark pass
    Resolve(ResolveCommand),

    /// Manage the landmark catalog
    #[command(subcommand)]
    Landmark(LandmarkCommand),

    /// Manage officers
    #[command(subcommand)]
    Officer(OfficerCommand),

    /// Manage device allotments
    #[command(subcommand)]
    Allot(AllotCommand),

    /// Manage device records
    #[command(subcommand)]
    Device(DeviceCommand),

    /// Append current locations to per-device history files
    Export(ExportCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "geotrack");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["geotrack", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["geotrack", "-q", "status"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["geotrack", "-v", "status"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["geotrack", "-vv", "status"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_report_with_negative_coordinates() {
        let cli = parse(&["geotrack", "report", "x1", "-33.86", "-151.2", "-b", "80%"]);
        let Command::Report(report) = cli.command else {
            panic!("expected report command");
        };
        assert_eq!(report.device_id, "x1");
        assert_eq!(report.latitude, -33.86);
        assert_eq!(report.longitude, -151.2);
        assert_eq!(report.battery.as_deref(), Some("80%"));
        assert!(report.name.is_none());
    }

    #[test]
    fn test_parse_report_rejects_non_numeric() {
        assert!(Cli::try_parse_from(["geotrack", "report", "x1", "north", "1"]).is_err());
    }

    #[test]
    fn test_parse_list_as_officer() {
        let cli = parse(&["geotrack", "list", "--officer", "off1", "-f", "json"]);
        let Command::List(list) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(list.caller(), crate::model::Caller::officer("off1"));
        assert_eq!(list.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_landmark_add() {
        let cli = parse(&["geotrack", "landmark", "add", "Depot", "51.5", "-0.12"]);
        assert!(matches!(
            cli.command,
            Command::Landmark(LandmarkCommand::Add { ref name, .. }) if name == "Depot"
        ));
    }

    #[test]
    fn test_parse_allot_commands() {
        let cli = parse(&["geotrack", "allot", "add", "off1", "x1"]);
        assert!(matches!(cli.command, Command::Allot(AllotCommand::Add(_))));

        let cli = parse(&["geotrack", "allot", "prune"]);
        assert!(matches!(cli.command, Command::Allot(AllotCommand::Prune)));
    }

    #[test]
    fn test_parse_export_interval_requires_watch() {
        assert!(Cli::try_parse_from(["geotrack", "export", "-i", "5"]).is_err());

        let cli = parse(&["geotrack", "export", "--watch", "-i", "5"]);
        let Command::Export(export) = cli.command else {
            panic!("expected export command");
        };
        assert!(export.watch);
        assert_eq!(export.interval, Some(5));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["geotrack", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
