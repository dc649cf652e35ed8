//! Periodic export of device locations to per-device history files.
//!
//! Each export pass reads the location store as it is, without running the
//! resolver, and appends one JSON line per device to
//! `<dir>/<device file stem>.jsonl`. Repeated passes build up a position
//! history that the store itself does not keep.

use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::DeviceView;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Default time between export passes.
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// One line of a device history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// The device as stored at export time.
    #[serde(flatten)]
    pub device: DeviceView,
    /// When the line was written.
    pub exported_at: DateTime<Utc>,
}

/// Outcome of one export pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Devices written.
    pub devices: usize,
    /// History files touched, in write order.
    pub files: Vec<PathBuf>,
}

/// Map a device id to a file stem that stays inside the export directory.
///
/// Anything other than ASCII letters, digits, `-`, `_` and `.` becomes `_`,
/// and a leading `.` is replaced so the result is never hidden, `.` or `..`.
#[must_use]
pub fn sanitize_file_stem(device_id: &str) -> String {
    let mut stem: String = device_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.starts_with('.') {
        stem.replace_range(0..1, "_");
    }
    if stem.is_empty() {
        stem.push('_');
    }
    stem
}

/// The history file for a device.
#[must_use]
pub fn history_path(dir: &Path, device_id: &str) -> PathBuf {
    dir.join(format!("{}.jsonl", sanitize_file_stem(device_id)))
}

/// Append the current record of every device to its history file.
///
/// # Errors
///
/// Returns an error if the store cannot be read, the directory cannot be
/// created, or a history file cannot be written.
pub fn export_once(storage: &Storage, dir: &Path) -> Result<ExportSummary> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let exported_at = Utc::now();
    let mut summary = ExportSummary::default();

    for record in storage.list_locations()? {
        if record.coordinate().is_none() {
            warn!(
                "Device {} has malformed coordinates, exporting them as null",
                record.device_id
            );
        }
        let path = history_path(dir, &record.device_id);
        let row = ExportRow {
            device: DeviceView::from(record),
            exported_at,
        };

        let mut line = serde_json::to_string(&row)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;

        debug!("Appended {} to {}", row.device.device_id, path.display());
        summary.devices += 1;
        summary.files.push(path);
    }

    info!(
        devices = summary.devices,
        dir = %dir.display(),
        "Export pass complete"
    );
    Ok(summary)
}

/// Read back every row of one history file, oldest first.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not valid JSON.
pub fn read_history(path: &Path) -> Result<Vec<ExportRow>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

/// Settings for a periodic exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSchedule {
    /// Database to read.
    pub database_path: PathBuf,
    /// Busy timeout for each pass's connection.
    pub busy_timeout: Duration,
    /// Directory receiving the history files.
    pub directory: PathBuf,
    /// Time between passes.
    pub interval: Duration,
}

/// Run export passes on `schedule` until `shutdown` completes.
///
/// The first pass runs immediately. Each pass opens its own connection on a
/// blocking thread. A failed pass is logged and the loop carries on.
/// Returns the number of passes that succeeded.
///
/// # Errors
///
/// Returns an error if a blocking export task panics.
pub async fn run_until<F>(schedule: ExportSchedule, shutdown: F) -> Result<usize>
where
    F: Future<Output = ()>,
{
    info!(
        interval_secs = schedule.interval.as_secs(),
        dir = %schedule.directory.display(),
        "Starting periodic export"
    );

    let mut ticker = interval(schedule.interval);
    let mut completed = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                let pass = schedule.clone();
                let outcome = tokio::task::spawn_blocking(move || -> Result<ExportSummary> {
                    let storage =
                        Storage::open_with_busy_timeout(&pass.database_path, pass.busy_timeout)?;
                    export_once(&storage, &pass.directory)
                })
                .await
                .map_err(|err| Error::internal(format!("export task failed: {err}")))?;

                match outcome {
                    Ok(_) => completed += 1,
                    Err(err) => warn!(error = %err, "Export pass failed"),
                }
            }
        }
    }

    info!(passes = completed, "Periodic export stopped");
    Ok(completed)
}

/// Run export passes on `schedule` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if a blocking export task panics.
pub async fn run_periodic(schedule: ExportSchedule) -> Result<usize> {
    run_until(schedule, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await
}
