//! Entry point for the `incident-sync` binary.
#![forbid(unsafe_code)]

use incident_cli::CliError;

fn main() -> eyre::Result<()> {
    match incident_cli::run() {
        // Help, version and usage errors keep clap's own output and exit code.
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        other => other.map_err(eyre::Report::from),
    }
}
