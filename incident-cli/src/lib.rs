//! Command-line interface for the incident synchronisation tool.
//!
//! `incident-sync sync` pulls one country's incidents for a date window from
//! the ACLED API and inserts the unseen ones into an ArcGIS feature layer.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod logging;
mod sync;

pub use error::CliError;
use sync::{SyncArgs, run_sync};

const ARG_ACLED_API: &str = "acled-api";
const ARG_ACLED_ACCESS_TOKEN: &str = "acled-access-token";
const ARG_ACLED_EMAIL: &str = "acled-email";
const ARG_ARCGIS_PORTAL: &str = "arcgis-portal";
const ARG_ARCGIS_USER: &str = "arcgis-user";
const ARG_ARCGIS_PASSWORD: &str = "arcgis-password";
const ARG_ARCGIS_ITEM_ID: &str = "arcgis-item-id";
const ARG_COUNTRY: &str = "country";
const ARG_DAYS: &str = "days";
const ARG_START_DATE: &str = "start-date";
const ARG_END_DATE: &str = "end-date";
const ARG_YEAR: &str = "year";
const ARG_RECORDS: &str = "records";
const ARG_ENV: &str = "env";
const ARG_GAZETTEER: &str = "gazetteer";
const ARG_LOG_FILE: &str = "log-file";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";

const ENV_ACLED_API: &str = "INCIDENTS_CMDS_SYNC_ACLED_API";
const ENV_ACLED_ACCESS_TOKEN: &str = "INCIDENTS_CMDS_SYNC_ACLED_ACCESS_TOKEN";
const ENV_ACLED_EMAIL: &str = "INCIDENTS_CMDS_SYNC_ACLED_EMAIL";
const ENV_ARCGIS_PORTAL: &str = "INCIDENTS_CMDS_SYNC_ARCGIS_PORTAL";
const ENV_ARCGIS_USER: &str = "INCIDENTS_CMDS_SYNC_ARCGIS_USER";
const ENV_ARCGIS_PASSWORD: &str = "INCIDENTS_CMDS_SYNC_ARCGIS_PASSWORD";
const ENV_ARCGIS_ITEM_ID: &str = "INCIDENTS_CMDS_SYNC_ARCGIS_ITEM_ID";

const DEFAULT_COUNTRY: &str = "Ukraine";
const DEFAULT_GAZETTEER: &str = "gazetteer.json";
const DEFAULT_ENV_FILE: &str = ".env";
const LOG_FILE_NAME: &str = "logs.txt";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments, configuration, or the run itself
/// fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Sync(args) => run_sync(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "incident-sync",
    about = "Copy ACLED conflict incidents into an ArcGIS feature layer",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one country's incidents for a date window and insert new ones.
    Sync(SyncArgs),
}

#[cfg(test)]
mod tests;
