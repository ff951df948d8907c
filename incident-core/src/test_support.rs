//! In-memory doubles for the source and store seams, plus record builders,
//! shared by unit and behaviour tests.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    FeatureRecord, FeatureStore, IdentifierSet, IncidentPage, IncidentQuery, IncidentSource,
    InsertOutcome, PAGE_SIZE, RawField, RawIncident, SourceError, StoreError,
};

/// Fixed `date_fetched` clock: 2024-03-02T00:00:00Z.
#[must_use]
pub fn fixed_clock() -> DateTime<Utc> {
    DateTime::from_timestamp(1_709_337_600, 0).unwrap_or_default()
}

/// A fully populated raw incident that validates cleanly.
///
/// Numbers are string-encoded the way the source API sends them. `admin1`
/// is `"Kyiv City"` so gazetteer mappings can be exercised.
#[must_use]
pub fn raw_incident(identifier: &str) -> RawIncident {
    let text = |value: &str| Some(RawField::from(value));
    RawIncident {
        event_id_cnty: text(identifier),
        event_date: text("2024-03-01"),
        year: text("2024"),
        time_precision: text("1"),
        disorder_type: text("Political violence"),
        event_type: text("Explosions/Remote violence"),
        sub_event_type: text("Shelling/artillery/missile attack"),
        actor1: text("Military Forces of Testland"),
        assoc_actor_1: text(""),
        inter1: text("1"),
        actor2: text("Civilians (Testland)"),
        assoc_actor_2: text(""),
        inter2: text("7"),
        interaction: text("17"),
        civilian_targeting: text("Civilian targeting"),
        iso: text("804"),
        country: text("Testland"),
        admin1: text("Kyiv City"),
        admin2: text("Kyiv"),
        admin3: text(""),
        location: text("Kyiv"),
        latitude: text("50.4500"),
        longitude: text("30.5233"),
        geo_precision: text("1"),
        source: text("Local media"),
        source_scale: text("National"),
        notes: text("Test incident."),
        fatalities: text("0"),
        tags: text(""),
        timestamp: text("1709337600"),
    }
}

/// A page holding one valid record per identifier.
#[must_use]
pub fn page_of(identifiers: &[&str]) -> IncidentPage {
    IncidentPage::new(identifiers.iter().map(|id| raw_incident(id)).collect())
}

/// A page of exactly [`PAGE_SIZE`] valid records named `{prefix}{n}`.
#[must_use]
pub fn full_page(prefix: &str) -> IncidentPage {
    IncidentPage::new(
        (1..=PAGE_SIZE)
            .map(|n| raw_incident(&format!("{prefix}{n}")))
            .collect(),
    )
}

/// `IncidentSource` replaying a fixed list of pages.
///
/// Page `n` returns the `n`th scripted page; pages past the end are empty.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pages: Vec<IncidentPage>,
    failure: Option<(u32, SourceError)>,
    calls: RefCell<Vec<u32>>,
    queries: RefCell<Vec<IncidentQuery>>,
}

impl ScriptedSource {
    /// Replay `pages` in order.
    #[must_use]
    pub fn new(pages: Vec<IncidentPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Fail with `error` when `page` is requested.
    #[must_use]
    pub fn failing_on(mut self, page: u32, error: SourceError) -> Self {
        self.failure = Some((page, error));
        self
    }

    /// Page numbers requested so far.
    #[must_use]
    pub fn calls(&self) -> Vec<u32> {
        self.calls.borrow().clone()
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<IncidentQuery> {
        self.queries.borrow().clone()
    }
}

impl IncidentSource for ScriptedSource {
    fn fetch_page(&self, query: &IncidentQuery, page: u32) -> Result<IncidentPage, SourceError> {
        self.calls.borrow_mut().push(page);
        self.queries.borrow_mut().push(query.clone());
        if let Some((failing, error)) = &self.failure
            && *failing == page
        {
            return Err(error.clone());
        }
        let index = usize::try_from(page)
            .ok()
            .and_then(|page| page.checked_sub(1));
        Ok(index
            .and_then(|index| self.pages.get(index))
            .cloned()
            .unwrap_or_default())
    }
}

/// `FeatureStore` keeping inserted rows in memory.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    preloaded: IdentifierSet,
    inserted: Vec<FeatureRecord>,
    rejections: HashMap<String, String>,
    insert_failure: Option<StoreError>,
    load_failure: Option<StoreError>,
    attempts: usize,
}

impl MemoryFeatureStore {
    /// A store that already holds `identifiers`.
    #[must_use]
    pub fn with_identifiers<I, T>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            preloaded: identifiers.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Refuse inserts of `identifier` with `detail`.
    #[must_use]
    pub fn rejecting(mut self, identifier: &str, detail: &str) -> Self {
        self.rejections
            .insert(identifier.to_owned(), detail.to_owned());
        self
    }

    /// Fail every insert request in transport.
    #[must_use]
    pub fn failing_inserts(mut self, error: StoreError) -> Self {
        self.insert_failure = Some(error);
        self
    }

    /// Fail the identifier snapshot.
    #[must_use]
    pub fn failing_load(mut self, error: StoreError) -> Self {
        self.load_failure = Some(error);
        self
    }

    /// Rows accepted so far.
    #[must_use]
    pub fn inserted(&self) -> &[FeatureRecord] {
        &self.inserted
    }

    /// Identifiers of the rows accepted so far, in insertion order.
    #[must_use]
    pub fn inserted_identifiers(&self) -> Vec<&str> {
        self.inserted.iter().map(FeatureRecord::identifier).collect()
    }

    /// Insert requests received, including refused ones.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn load_existing_identifiers(&self) -> Result<IdentifierSet, StoreError> {
        if let Some(error) = &self.load_failure {
            return Err(error.clone());
        }
        let mut ids = self.preloaded.clone();
        ids.extend(self.inserted.iter().map(FeatureRecord::identifier));
        Ok(ids)
    }

    fn insert(&mut self, feature: &FeatureRecord) -> Result<InsertOutcome, StoreError> {
        self.attempts = self.attempts.saturating_add(1);
        if let Some(error) = &self.insert_failure {
            return Err(error.clone());
        }
        if let Some(detail) = self.rejections.get(feature.identifier()) {
            return Ok(InsertOutcome::Rejected {
                detail: detail.clone(),
            });
        }
        self.inserted.push(feature.clone());
        Ok(InsertOutcome::Added)
    }
}
