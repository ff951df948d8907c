//! Test doubles and argument builders shared by the sync CLI tests.

use super::*;
use crate::sync::{SyncBackend, SyncBackendBuilder, SyncConfig};
use camino::Utf8PathBuf;
use chrono::NaiveDate;
use incident_core::test_support::{MemoryFeatureStore, ScriptedSource};
use incident_core::{IncidentPage, IncidentQuery, IncidentSource, SourceError};
use std::{cell::RefCell, fs, rc::Rc};
use tempfile::TempDir;

pub(super) const CREDENTIALS: [(&str, &str); 7] = [
    (ARG_ACLED_API, "https://api.example.test/acled/read"),
    (ARG_ACLED_ACCESS_TOKEN, "secret-key"),
    (ARG_ACLED_EMAIL, "analyst@example.test"),
    (ARG_ARCGIS_PORTAL, "https://gis.example.test/portal"),
    (ARG_ARCGIS_USER, "analyst"),
    (ARG_ARCGIS_PASSWORD, "hunter2"),
    (ARG_ARCGIS_ITEM_ID, "abc123"),
];

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// `--flag value` pairs for every credential except `omit`.
pub(super) fn credential_argv(omit: Option<&str>) -> Vec<String> {
    CREDENTIALS
        .iter()
        .filter(|(flag, _)| Some(*flag) != omit)
        .flat_map(|(flag, value)| [format!("--{flag}"), (*value).to_owned()])
        .collect()
}

/// Arguments that resolve without touching any other layer.
pub(super) fn complete_args() -> SyncArgs {
    SyncArgs {
        acled_api: Some(CREDENTIALS[0].1.to_owned()),
        acled_access_token: Some(CREDENTIALS[1].1.to_owned()),
        acled_email: Some(CREDENTIALS[2].1.to_owned()),
        arcgis_portal: Some(CREDENTIALS[3].1.to_owned()),
        arcgis_user: Some(CREDENTIALS[4].1.to_owned()),
        arcgis_password: Some(CREDENTIALS[5].1.to_owned()),
        arcgis_item_id: Some(CREDENTIALS[6].1.to_owned()),
        start_date: Some(date(2024, 3, 1)),
        end_date: Some(date(2024, 3, 7)),
        ..SyncArgs::default()
    }
}

/// Temporary directory holding gazetteer and log files.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn gazetteer_path(&self) -> Utf8PathBuf {
        self.path("gazetteer.json")
    }

    pub(super) fn write_gazetteer(&self) -> Utf8PathBuf {
        let path = self.gazetteer_path();
        fs::write(&path, br#"{"admin1_name": {"Kyiv City": "Kyiv"}}"#).expect("write gazetteer");
        path
    }
}

type QueryLog = Rc<RefCell<Vec<IncidentQuery>>>;

/// Forwards to a scripted source while keeping the queries it was asked.
struct RecordingSource {
    inner: ScriptedSource,
    queries: QueryLog,
}

impl IncidentSource for RecordingSource {
    fn fetch_page(&self, query: &IncidentQuery, page: u32) -> Result<IncidentPage, SourceError> {
        self.queries.borrow_mut().push(query.clone());
        self.inner.fetch_page(query, page)
    }
}

/// Builds in-memory backends in place of the HTTP adapters.
#[derive(Default)]
pub(super) struct StubBackendBuilder {
    pages: Vec<IncidentPage>,
    existing: Vec<String>,
    source_failure: Option<SourceError>,
    queries: QueryLog,
}

impl StubBackendBuilder {
    pub(super) fn new(pages: Vec<IncidentPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub(super) fn set_pages(&mut self, pages: Vec<IncidentPage>) {
        self.pages = pages;
    }

    pub(super) fn set_existing(&mut self, identifiers: &[&str]) {
        self.existing = identifiers.iter().map(|id| (*id).to_owned()).collect();
    }

    pub(super) fn set_source_failure(&mut self, error: SourceError) {
        self.source_failure = Some(error);
    }

    pub(super) fn queries(&self) -> Vec<IncidentQuery> {
        self.queries.borrow().clone()
    }
}

impl SyncBackendBuilder for StubBackendBuilder {
    fn build(&self, _config: &SyncConfig) -> Result<SyncBackend, CliError> {
        let mut inner = ScriptedSource::new(self.pages.clone());
        if let Some(error) = self.source_failure.clone() {
            inner = inner.failing_on(1, error);
        }
        let source = RecordingSource {
            inner,
            queries: Rc::clone(&self.queries),
        };
        let store = MemoryFeatureStore::with_identifiers(self.existing.clone());
        Ok(SyncBackend {
            source: Box::new(source),
            store: Box::new(store),
        })
    }
}
