//! Log file sink for the binary.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! bridges those records and appends one timestamped line per event.

use std::fs::File;
use std::sync::Mutex;

use camino::Utf8Path;
use tracing_subscriber::filter::LevelFilter;

use crate::CliError;

/// Open `path` for appending, creating it and its parent directories.
pub(crate) fn log_writer(path: &Utf8Path) -> Result<Mutex<File>, CliError> {
    let file = incident_fs::open_append(path).map_err(|source| CliError::OpenLogFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Mutex::new(file))
}

/// Install the process-wide subscriber writing to `path` at `info` level.
pub(crate) fn init(path: &Utf8Path) -> Result<(), CliError> {
    let writer = log_writer(path)?;
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .with_max_level(LevelFilter::INFO)
        .with_writer(writer)
        .try_init()
        .map_err(|err| CliError::InstallLogger {
            message: err.to_string(),
        })
}
