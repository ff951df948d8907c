//! The synchronisation loop.
//!
//! [`SyncEngine`] pulls pages from an [`IncidentSource`], validates each
//! record, normalises its admin region and inserts it into a
//! [`FeatureStore`] unless its identifier is already present. The identifier
//! snapshot and the counters for one run travel together as [`RunState`],
//! threaded by value through [`SyncEngine::process_page`] and
//! [`SyncEngine::process_record`].
//!
//! Paging ends on the first page with at most one record, on the first page
//! whose reported count is below [`crate::PAGE_SIZE`], or once the optional
//! record limit has been reached.

use std::io::Write;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    FeatureRecord, FeatureStore, Gazetteer, IdentifierSet, IncidentQuery, IncidentRecord,
    IncidentSource, InsertOutcome, RawIncident, RunReporter, RunSummary, SourceError, StoreError,
};

/// Source of the `date_fetched` timestamp.
pub type Clock = fn() -> DateTime<Utc>;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The existing identifiers could not be read from the store.
    #[error("failed to load existing identifiers")]
    LoadIdentifiers {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// A page could not be fetched from the source.
    #[error("failed to fetch page {page}")]
    FetchPage {
        /// Page number that failed.
        page: u32,
        /// Underlying source error.
        #[source]
        source: SourceError,
    },
    /// An insert request failed in transport.
    #[error("failed to submit {identifier} to the feature store")]
    Insert {
        /// Identifier of the record being inserted.
        identifier: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

/// State scoped to a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Counters accumulated so far.
    pub summary: RunSummary,
    /// Identifiers known to be stored, including those added during the run.
    pub existing_ids: IdentifierSet,
}

impl RunState {
    /// Start a run against a snapshot of stored identifiers.
    #[must_use]
    pub fn new(existing_ids: IdentifierSet) -> Self {
        Self {
            summary: RunSummary::default(),
            existing_ids,
        }
    }

    fn with_summary(self, update: impl FnOnce(RunSummary) -> RunSummary) -> Self {
        Self {
            summary: update(self.summary),
            ..self
        }
    }
}

/// Drives one source into one store.
#[derive(Debug)]
pub struct SyncEngine<S, F> {
    source: S,
    store: F,
    gazetteer: Gazetteer,
    record_limit: Option<u64>,
    clock: Clock,
}

impl<S, F> SyncEngine<S, F>
where
    S: IncidentSource,
    F: FeatureStore,
{
    /// Create an engine with no record limit and the system clock.
    #[must_use]
    pub fn new(source: S, store: F, gazetteer: Gazetteer) -> Self {
        Self {
            source,
            store,
            gazetteer,
            record_limit: None,
            clock: Utc::now,
        }
    }

    /// Stop paging once at least `limit` records have been processed.
    #[must_use]
    pub fn with_record_limit(mut self, limit: Option<u64>) -> Self {
        self.record_limit = limit;
        self
    }

    /// Replace the clock used to stamp `date_fetched`.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run the synchronisation for `query`.
    ///
    /// # Errors
    /// Returns [`SyncError`] when the identifier snapshot cannot be loaded,
    /// when a page cannot be fetched, or when an insert fails in transport.
    /// Records the store refuses and records that fail validation are
    /// counted and skipped.
    pub fn run<W: Write>(
        &mut self,
        query: &IncidentQuery,
        reporter: &mut RunReporter<W>,
    ) -> Result<RunState, SyncError> {
        let existing_ids = self
            .store
            .load_existing_identifiers()
            .map_err(|source| SyncError::LoadIdentifiers { source })?;
        log::info!(
            "starting sync for {} ({}) against {} stored identifiers",
            query.country,
            query.event_date_range(),
            existing_ids.len()
        );

        let mut state = RunState::new(existing_ids);
        let mut page = 1_u32;
        loop {
            let fetched = self
                .source
                .fetch_page(query, page)
                .map_err(|source| SyncError::FetchPage { page, source })?;
            if fetched.records.is_empty() {
                log::info!("page {page} is empty; no further results");
                break;
            }
            if fetched.is_exhausted() {
                let identifier = fetched.records.first().and_then(RawIncident::identifier);
                reporter.page_dropped(page, identifier.as_deref());
                break;
            }

            reporter.page(page, fetched.records.len(), &query.country);
            let last = fetched.is_last();
            state = self.process_page(state, fetched.records, reporter)?;

            if last || self.limit_reached(&state.summary) {
                break;
            }
            let Some(next) = page.checked_add(1) else {
                break;
            };
            page = next;
        }
        Ok(state)
    }

    /// Process every record of one page in order.
    ///
    /// # Errors
    /// Propagates the first transport failure from [`Self::process_record`].
    pub fn process_page<W: Write>(
        &mut self,
        state: RunState,
        records: Vec<RawIncident>,
        reporter: &mut RunReporter<W>,
    ) -> Result<RunState, SyncError> {
        let state = state.with_summary(RunSummary::record_page);
        records
            .into_iter()
            .try_fold(state, |state, raw| self.process_record(state, raw, reporter))
    }

    /// Validate, deduplicate and insert one record.
    ///
    /// # Errors
    /// Returns [`SyncError::Insert`] when the insert request itself fails.
    pub fn process_record<W: Write>(
        &mut self,
        state: RunState,
        raw: RawIncident,
        reporter: &mut RunReporter<W>,
    ) -> Result<RunState, SyncError> {
        let mut state = state.with_summary(RunSummary::record_processed);

        let incident = match IncidentRecord::try_from(raw) {
            Ok(incident) => incident,
            Err(err) => {
                reporter.record_rejected(&err);
                return Ok(state.with_summary(RunSummary::record_rejected));
            }
        };
        let feature = FeatureRecord::assemble(incident, &self.gazetteer, (self.clock)());

        if state.existing_ids.contains(feature.identifier()) {
            log::debug!("{} already stored", feature.identifier());
            return Ok(state.with_summary(RunSummary::record_existing));
        }

        let outcome = self
            .store
            .insert(&feature)
            .map_err(|source| SyncError::Insert {
                identifier: feature.identifier().to_owned(),
                source,
            })?;
        match outcome {
            InsertOutcome::Added => {
                log::debug!("added {}", feature.identifier());
                state.existing_ids.insert(feature.identifier());
                Ok(state.with_summary(RunSummary::record_added))
            }
            InsertOutcome::Rejected { detail } => {
                reporter.insert_failed(&feature, &detail);
                Ok(state.with_summary(RunSummary::record_failed))
            }
        }
    }

    /// The incident source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The feature store.
    #[must_use]
    pub const fn store(&self) -> &F {
        &self.store
    }

    /// Consume the engine, returning the source and store.
    #[must_use]
    pub fn into_parts(self) -> (S, F) {
        (self.source, self.store)
    }

    fn limit_reached(&self, summary: &RunSummary) -> bool {
        self.record_limit
            .is_some_and(|limit| summary.processed >= limit)
    }
}
