//! `geotrack` - CLI for the geotrack location engine
//!
//! This binary records device reports, manages the landmark catalog, officers
//! and allotments, lists devices per caller, and exports location history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::Parser;

use geotrack::cli::{
    AllotCommand, Cli, Command, ConfigCommand, DeviceCommand, ExportCommand, LandmarkCommand,
    OfficerCommand, OutputFormat, ReportCommand, StatusCommand,
};
use geotrack::export::{self, ExportSchedule};
use geotrack::{
    init_logging, Allotment, Config, Landmark, LocationRecord, LocationReport, Officer, Storage,
    Tracker,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Report(cmd) => handle_report(&config, cmd),
        Command::List(cmd) => {
            let tracker = open_tracker(&config)?;
            let records = tracker.list(&cmd.caller())?;
            print_devices(&records, cmd.format)
        }
        Command::Resolve(cmd) => {
            let stats = open_tracker(&config)?.resolve_all()?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "Resolved {} device(s): {} updated, {} skipped",
                    stats.devices, stats.updated, stats.skipped_devices
                );
                if stats.skipped_landmarks > 0 {
                    println!("Ignored {} malformed landmark(s)", stats.skipped_landmarks);
                }
            }
            Ok(())
        }
        Command::Landmark(cmd) => handle_landmark(&open_storage(&config)?, cmd),
        Command::Officer(cmd) => handle_officer(&open_storage(&config)?, cmd),
        Command::Allot(cmd) => handle_allot(&open_storage(&config)?, cmd),
        Command::Device(cmd) => handle_device(&open_storage(&config)?, &cmd),
        Command::Export(cmd) => handle_export(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open_with_busy_timeout(&path, config.busy_timeout())
        .with_context(|| format!("opening database {}", path.display()))
}

fn open_tracker(config: &Config) -> Result<Tracker> {
    Ok(Tracker::new(open_storage(config)?))
}

fn handle_report(config: &Config, cmd: ReportCommand) -> Result<()> {
    let report = LocationReport::new(
        cmd.device_id,
        cmd.latitude,
        cmd.longitude,
        cmd.battery,
        cmd.name,
    )?;
    let record = open_tracker(config)?.record(&report)?;
    println!(
        "Recorded {} at ({}, {})",
        record.device_id, record.latitude, record.longitude
    );
    Ok(())
}

fn print_devices(records: &[LocationRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let views: Vec<geotrack::DeviceView> =
                records.iter().cloned().map(Into::into).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        OutputFormat::Table => {
            println!(
                "{:<16} {:<20} {:>10} {:>11} {:<20} {:<8} {}",
                "DEVICE", "NAME", "LAT", "LON", "LANDMARK", "BATTERY", "LAST REPORT"
            );
            for r in records {
                println!(
                    "{:<16} {:<20} {:>10.5} {:>11.5} {:<20} {:<8} {}",
                    r.device_id,
                    r.display_name,
                    r.latitude,
                    r.longitude,
                    r.nearest_landmark.as_deref().unwrap_or("-"),
                    r.battery,
                    r.timestamp.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        OutputFormat::Plain => {
            for r in records {
                println!(
                    "{} ({}) at {}, {} near {} battery {} [{}]",
                    r.device_id,
                    r.display_name,
                    r.latitude,
                    r.longitude,
                    r.nearest_landmark.as_deref().unwrap_or("unknown"),
                    r.battery,
                    r.timestamp.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

fn handle_landmark(storage: &Storage, cmd: LandmarkCommand) -> Result<()> {
    match cmd {
        LandmarkCommand::Add {
            name,
            latitude,
            longitude,
        } => {
            let id = storage.add_landmark(&Landmark::new(name, latitude, longitude))?;
            println!("Added landmark {id}");
        }
        LandmarkCommand::List { format } => {
            let landmarks = storage.list_landmarks()?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&landmarks)?);
            } else {
                for l in &landmarks {
                    println!(
                        "{:>5}  {:<24} {:>10.5} {:>11.5}",
                        l.id.unwrap_or_default(),
                        l.name,
                        l.latitude,
                        l.longitude
                    );
                }
            }
        }
        LandmarkCommand::Remove { id } => {
            if !storage.remove_landmark(id)? {
                bail!("no landmark with id {id}");
            }
            println!("Removed landmark {id}");
        }
    }
    Ok(())
}

fn handle_officer(storage: &Storage, cmd: OfficerCommand) -> Result<()> {
    match cmd {
        OfficerCommand::Add(args) => {
            let officer = Officer::from(args);
            storage.add_officer(&officer)?;
            println!("Added officer {}", officer.officer_id);
        }
        OfficerCommand::List { format } => {
            let officers = storage.list_officers()?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&officers)?);
            } else {
                for o in &officers {
                    println!(
                        "{:<12} {:<24} {:<16} {:<16} {}",
                        o.officer_id, o.name, o.contact, o.device_name, o.device_contact
                    );
                }
            }
        }
        OfficerCommand::Remove { officer_id } => {
            if !storage.remove_officer(&officer_id)? {
                bail!("no officer with id {officer_id}");
            }
            println!("Removed officer {officer_id}");
        }
    }
    Ok(())
}

fn handle_allot(storage: &Storage, cmd: AllotCommand) -> Result<()> {
    match cmd {
        AllotCommand::Add(args) => {
            let allotment = Allotment::from(&args);
            if storage.allot(&allotment)? {
                println!("Allotted {} to {}", allotment.device_id, allotment.officer_id);
            } else {
                println!(
                    "{} is already allotted to {}",
                    allotment.device_id, allotment.officer_id
                );
            }
        }
        AllotCommand::Remove(args) => {
            let allotment = Allotment::from(&args);
            if !storage.revoke(&allotment)? {
                bail!(
                    "{} is not allotted to {}",
                    allotment.device_id,
                    allotment.officer_id
                );
            }
            println!(
                "Withdrew {} from {}",
                allotment.device_id, allotment.officer_id
            );
        }
        AllotCommand::List { officer, format } => {
            let allotments = storage.list_allotments(officer.as_deref())?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&allotments)?);
            } else {
                for a in &allotments {
                    println!("{:<12} {}", a.officer_id, a.device_id);
                }
            }
        }
        AllotCommand::Prune => {
            let pruned = storage.prune_orphaned_allotments()?;
            println!("Pruned {pruned} orphaned allotment(s)");
        }
    }
    Ok(())
}

fn handle_device(storage: &Storage, cmd: &DeviceCommand) -> Result<()> {
    match cmd {
        DeviceCommand::Remove { device_id } => {
            if !storage.remove_location(device_id)? {
                bail!("no device with id {device_id}");
            }
            println!("Removed device {device_id}");
        }
    }
    Ok(())
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> Result<()> {
    let directory = cmd.dir.clone().unwrap_or_else(|| config.export_dir());

    if !cmd.watch {
        let summary = export::export_once(&open_storage(config)?, &directory)?;
        println!(
            "Exported {} device(s) to {}",
            summary.devices,
            directory.display()
        );
        return Ok(());
    }

    let interval = match cmd.interval {
        Some(0) => bail!("--interval must be greater than 0"),
        Some(minutes) => std::time::Duration::from_secs(minutes * 60),
        None => config.export_interval(),
    };
    let schedule = ExportSchedule {
        database_path: config.database_path(),
        busy_timeout: config.busy_timeout(),
        directory,
        interval,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let passes = runtime.block_on(export::run_periodic(schedule))?;
    println!("Stopped after {passes} export pass(es)");
    Ok(())
}

fn handle_status(config: &Config, cmd: &StatusCommand) -> Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if cmd.json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "export_dir": config.export_dir(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("geotrack status");
        println!("---------------");
        println!("Database:      {}", storage.path().display());
        println!("Schema:        v{}", stats.schema_version);
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Devices:       {}", stats.devices);
        println!("Landmarks:     {}", stats.landmarks);
        println!("Officers:      {}", stats.officers);
        println!("Allotments:    {}", stats.allotments);
        match stats.last_report {
            Some(ts) => println!("Last report:   {}", ts.to_rfc3339()),
            None => println!("Last report:   never"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Export]");
                println!("  Directory:          {}", config.export_dir().display());
                println!("  Interval (min):     {}", config.export.interval_minutes);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
