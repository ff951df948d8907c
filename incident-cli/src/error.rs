//! Error types emitted by the incident sync CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use incident_core::{GazetteerError, SyncError};
use incident_data::ClientBuildError;
use incident_data::arcgis::ConnectError;
use thiserror::Error;

/// Errors emitted by the incident sync CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without the leading dashes.
        field: &'static str,
        /// Environment variable carrying the same value.
        env: &'static str,
    },
    /// Neither `--days` nor `--start-date` was given.
    #[error("no date window (set --days or --start-date)")]
    MissingDateWindow,
    /// `--days` reaches back before the earliest representable date.
    #[error("--days {days} reaches before the earliest supported date")]
    DaysOutOfRange {
        /// Requested look-back in days.
        days: u32,
    },
    /// The start date falls after the end date.
    #[error("start date {start} is after end date {end}")]
    InvalidDateWindow {
        /// Window start.
        start: NaiveDate,
        /// Window end.
        end: NaiveDate,
    },
    /// The `.env` file exists but could not be loaded.
    #[error("failed to load environment file {path:?}: {source}")]
    LoadEnvFile {
        /// Path of the environment file.
        path: Utf8PathBuf,
        /// Underlying parse or read failure.
        #[source]
        source: dotenv::Error,
    },
    /// The log file could not be opened for appending.
    #[error("failed to open log file {path:?}: {source}")]
    OpenLogFile {
        /// Path of the log file.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// A global logger was already installed.
    #[error("failed to install logger: {message}")]
    InstallLogger {
        /// Subscriber installation failure.
        message: String,
    },
    /// The admin-region gazetteer could not be loaded.
    #[error(transparent)]
    Gazetteer(#[from] GazetteerError),
    /// Constructing the ACLED client failed.
    #[error("failed to build ACLED client: {0}")]
    BuildClient(#[from] ClientBuildError),
    /// Signing in to the feature store failed.
    #[error("failed to connect to the feature store: {0}")]
    Connect(#[from] ConnectError),
    /// The run stopped on a fatal source or store failure.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
}
