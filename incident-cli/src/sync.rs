//! Sync command implementation for the incident sync CLI.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use incident_core::{
    FeatureStore, Gazetteer, IncidentQuery, IncidentSource, RunReporter, RunSummary, SyncEngine,
};
use incident_data::DEFAULT_TIMEOUT_SECS;
use incident_data::acled::{AcledClient, AcledClientConfig};
use incident_data::arcgis::{ArcGisConfig, ArcGisFeatureStore};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ACLED_ACCESS_TOKEN, ARG_ACLED_API, ARG_ACLED_EMAIL, ARG_ARCGIS_ITEM_ID, ARG_ARCGIS_PASSWORD,
    ARG_ARCGIS_PORTAL, ARG_ARCGIS_USER, ARG_COUNTRY, ARG_DAYS, ARG_END_DATE, ARG_ENV,
    ARG_GAZETTEER, ARG_LOG_FILE, ARG_RECORDS, ARG_START_DATE, ARG_TIMEOUT_SECS, ARG_YEAR, CliError,
    DEFAULT_COUNTRY, DEFAULT_ENV_FILE, DEFAULT_GAZETTEER, ENV_ACLED_ACCESS_TOKEN, ENV_ACLED_API,
    ENV_ACLED_EMAIL, ENV_ARCGIS_ITEM_ID, ENV_ARCGIS_PASSWORD, ENV_ARCGIS_PORTAL, ENV_ARCGIS_USER,
    LOG_FILE_NAME, logging,
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch one country's incidents for a date window from the \
                 ACLED API and insert those not yet present into an ArcGIS \
                 feature layer. Credentials can come from CLI flags, \
                 configuration files, environment variables, or a .env file.",
    about = "Synchronise ACLED incidents into a feature layer"
)]
#[ortho_config(prefix = "INCIDENTS")]
pub(crate) struct SyncArgs {
    /// ACLED read endpoint.
    #[arg(long = ARG_ACLED_API, value_name = "url")]
    #[serde(default)]
    pub(crate) acled_api: Option<String>,
    /// ACLED API key.
    #[arg(long = ARG_ACLED_ACCESS_TOKEN, value_name = "key")]
    #[serde(default)]
    pub(crate) acled_access_token: Option<String>,
    /// Email address registered with the ACLED key.
    #[arg(long = ARG_ACLED_EMAIL, value_name = "email")]
    #[serde(default)]
    pub(crate) acled_email: Option<String>,
    /// ArcGIS portal URL (e.g. "https://www.arcgis.com").
    #[arg(long = ARG_ARCGIS_PORTAL, value_name = "url")]
    #[serde(default)]
    pub(crate) arcgis_portal: Option<String>,
    /// ArcGIS account name.
    #[arg(long = ARG_ARCGIS_USER, value_name = "user")]
    #[serde(default)]
    pub(crate) arcgis_user: Option<String>,
    /// ArcGIS account password.
    #[arg(long = ARG_ARCGIS_PASSWORD, value_name = "password")]
    #[serde(default)]
    pub(crate) arcgis_password: Option<String>,
    /// Item ID of the destination feature service.
    #[arg(long = ARG_ARCGIS_ITEM_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) arcgis_item_id: Option<String>,
    /// Country to fetch (default "Ukraine").
    #[arg(long = ARG_COUNTRY, value_name = "name")]
    #[serde(default)]
    pub(crate) country: Option<String>,
    /// Fetch the last `n` days up to today; overrides the explicit dates.
    #[arg(long = ARG_DAYS, value_name = "n")]
    #[serde(default)]
    pub(crate) days: Option<u32>,
    /// First day of the window.
    #[arg(long = ARG_START_DATE, value_name = "YYYY-MM-DD")]
    #[serde(default)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Last day of the window (default today).
    #[arg(long = ARG_END_DATE, value_name = "YYYY-MM-DD")]
    #[serde(default)]
    pub(crate) end_date: Option<NaiveDate>,
    /// Restrict the fetch to one event year.
    #[arg(long = ARG_YEAR, value_name = "yyyy")]
    #[serde(default)]
    pub(crate) year: Option<i32>,
    /// Stop paging once this many records have been processed.
    #[arg(long = ARG_RECORDS, value_name = "n")]
    #[serde(default)]
    pub(crate) records: Option<u64>,
    /// Environment file loaded before configuration (default ".env").
    #[arg(long = ARG_ENV, value_name = "path")]
    #[serde(default)]
    pub(crate) env: Option<Utf8PathBuf>,
    /// Admin-region name table (default "gazetteer.json").
    #[arg(long = ARG_GAZETTEER, value_name = "path")]
    #[serde(default)]
    pub(crate) gazetteer: Option<Utf8PathBuf>,
    /// Log file to append to (default "logs.txt" beside the executable).
    #[arg(long = ARG_LOG_FILE, value_name = "path")]
    #[serde(default)]
    pub(crate) log_file: Option<Utf8PathBuf>,
    /// Per-request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// A credential that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Secret(String);

impl Secret {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AcledSettings {
    pub(crate) api_url: String,
    pub(crate) access_token: Secret,
    pub(crate) email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArcGisSettings {
    pub(crate) portal: String,
    pub(crate) user: String,
    pub(crate) password: Secret,
    pub(crate) item_id: String,
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncConfig {
    /// Capitalised country name sent to the source.
    pub(crate) country: String,
    pub(crate) year: Option<i32>,
    pub(crate) start_date: NaiveDate,
    pub(crate) end_date: NaiveDate,
    /// Processed-record cap.
    pub(crate) records: Option<u64>,
    pub(crate) gazetteer: Utf8PathBuf,
    pub(crate) log_file: Utf8PathBuf,
    pub(crate) timeout: Duration,
    pub(crate) acled: AcledSettings,
    pub(crate) arcgis: ArcGisSettings,
}

impl SyncConfig {
    /// Resolve merged arguments against `today`, the anchor for `--days` and
    /// the default end date.
    pub(crate) fn resolve(args: SyncArgs, today: NaiveDate) -> Result<Self, CliError> {
        let acled = AcledSettings {
            api_url: required(args.acled_api, ARG_ACLED_API, ENV_ACLED_API)?,
            access_token: Secret(required(
                args.acled_access_token,
                ARG_ACLED_ACCESS_TOKEN,
                ENV_ACLED_ACCESS_TOKEN,
            )?),
            email: required(args.acled_email, ARG_ACLED_EMAIL, ENV_ACLED_EMAIL)?,
        };
        let arcgis = ArcGisSettings {
            portal: required(args.arcgis_portal, ARG_ARCGIS_PORTAL, ENV_ARCGIS_PORTAL)?,
            user: required(args.arcgis_user, ARG_ARCGIS_USER, ENV_ARCGIS_USER)?,
            password: Secret(required(
                args.arcgis_password,
                ARG_ARCGIS_PASSWORD,
                ENV_ARCGIS_PASSWORD,
            )?),
            item_id: required(args.arcgis_item_id, ARG_ARCGIS_ITEM_ID, ENV_ARCGIS_ITEM_ID)?,
        };
        let (start_date, end_date) =
            date_window(args.days, args.start_date, args.end_date, today)?;
        let country = args
            .country
            .filter(|name| !name.trim().is_empty())
            .map_or_else(|| DEFAULT_COUNTRY.to_owned(), |name| capitalise(&name));

        Ok(Self {
            country,
            year: args.year,
            start_date,
            end_date,
            records: args.records,
            gazetteer: args
                .gazetteer
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_GAZETTEER)),
            log_file: args.log_file.unwrap_or_else(default_log_file),
            timeout: Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            acled,
            arcgis,
        })
    }

    pub(crate) fn query(&self) -> IncidentQuery {
        IncidentQuery::new(self.country.clone(), self.start_date, self.end_date)
            .with_year(self.year)
    }

    pub(crate) fn acled_client_config(&self) -> AcledClientConfig {
        AcledClientConfig::new(
            self.acled.api_url.clone(),
            self.acled.access_token.expose(),
            self.acled.email.clone(),
        )
        .with_timeout(self.timeout)
    }

    pub(crate) fn arcgis_config(&self) -> ArcGisConfig {
        ArcGisConfig::new(
            self.arcgis.portal.clone(),
            self.arcgis.user.clone(),
            self.arcgis.password.expose(),
            self.arcgis.item_id.clone(),
        )
        .with_timeout(self.timeout)
    }
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        Self::resolve(args, Local::now().date_naive())
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
    env: &'static str,
) -> Result<String, CliError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(CliError::MissingArgument { field, env })
}

/// `--days n` gives `[today - n, today]`; otherwise the start date is
/// required and the end date defaults to today.
pub(crate) fn date_window(
    days: Option<u32>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), CliError> {
    if let Some(days) = days {
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or(CliError::DaysOutOfRange { days })?;
        return Ok((start, today));
    }
    let start = start.ok_or(CliError::MissingDateWindow)?;
    let end = end.unwrap_or(today);
    if start > end {
        return Err(CliError::InvalidDateWindow { start, end });
    }
    Ok((start, end))
}

/// Upper-case the first character and lower-case the rest.
pub(crate) fn capitalise(name: &str) -> String {
    let mut chars = name.trim().chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}

fn default_log_file() -> Utf8PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| Utf8PathBuf::from_path_buf(exe).ok())
        .and_then(|exe| exe.parent().map(|dir| dir.join(LOG_FILE_NAME)))
        .unwrap_or_else(|| Utf8PathBuf::from(LOG_FILE_NAME))
}

/// Load `path` into the process environment before configuration merging.
///
/// A missing default `.env` is ignored; an explicitly named file must load.
pub(crate) fn load_env_file(path: Option<&Utf8Path>) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Utf8Path::new(DEFAULT_ENV_FILE);
            if !matches!(incident_fs::file_is_file(default), Ok(true)) {
                return Ok(());
            }
            default
        }
    };
    dotenv::from_path(path.as_std_path()).map_err(|source| CliError::LoadEnvFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Source and store for one run.
pub(crate) struct SyncBackend {
    pub(crate) source: Box<dyn IncidentSource>,
    pub(crate) store: Box<dyn FeatureStore>,
}

/// Builds the source and store for the current sync invocation.
pub(crate) trait SyncBackendBuilder {
    fn build(&self, config: &SyncConfig) -> Result<SyncBackend, CliError>;
}

pub(crate) struct HttpBackendBuilder;

impl SyncBackendBuilder for HttpBackendBuilder {
    fn build(&self, config: &SyncConfig) -> Result<SyncBackend, CliError> {
        let store = ArcGisFeatureStore::connect(&config.arcgis_config())?;
        let source = AcledClient::with_config(config.acled_client_config())?;
        Ok(SyncBackend {
            source: Box::new(source),
            store: Box::new(store),
        })
    }
}

pub(crate) fn run_sync(args: SyncArgs) -> Result<(), CliError> {
    let startup_log = args.log_file.clone().unwrap_or_else(default_log_file);
    let config = match load_config(args) {
        Ok(config) => config,
        Err(err) => {
            // Best effort: the caller still prints the error if no sink opens.
            if logging::init(&startup_log).is_ok() {
                log::error!("{err}");
            }
            return Err(err);
        }
    };
    logging::init(&config.log_file)?;
    log::info!("program started");

    let mut stdout = std::io::stdout().lock();
    execute_sync(&config, &HttpBackendBuilder, &mut stdout)
        .map(|_| ())
        .inspect_err(|err| log::error!("{err}"))
}

fn load_config(args: SyncArgs) -> Result<SyncConfig, CliError> {
    load_env_file(args.env.as_deref())?;
    args.into_config()
}

pub(crate) fn run_sync_with(
    args: SyncArgs,
    builder: &dyn SyncBackendBuilder,
    writer: &mut dyn Write,
) -> Result<RunSummary, CliError> {
    let config = args.into_config()?;
    execute_sync(&config, builder, writer)
}

fn execute_sync(
    config: &SyncConfig,
    builder: &dyn SyncBackendBuilder,
    writer: &mut dyn Write,
) -> Result<RunSummary, CliError> {
    let gazetteer = Gazetteer::load(&config.gazetteer)?;
    let backend = builder.build(config)?;
    let query = config.query();
    log::info!(
        "fetching {} incidents between {} and {}",
        query.country,
        query.start_date,
        query.end_date
    );

    let mut engine = SyncEngine::new(backend.source, backend.store, gazetteer)
        .with_record_limit(config.records);
    let mut reporter = RunReporter::new(writer);
    let state = engine.run(&query, &mut reporter)?;
    reporter.report(&state.summary, &config.country, config.year);
    log::info!("end of import");
    Ok(state.summary)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
    today: NaiveDate,
) -> Result<SyncConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncConfig::resolve(merged, today)
}
