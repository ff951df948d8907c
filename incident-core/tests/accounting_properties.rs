//! Property-based tests for run accounting.
//!
//! # Invariants tested
//!
//! - **Balance:** every processed record is counted exactly once as added,
//!   existing, failed or rejected.
//! - **No duplicates:** an identifier is inserted at most once per store.
//! - **Dedup:** identifiers present before the run are never inserted.
//! - **Idempotence:** a second run over the same pages adds nothing.

use std::collections::HashSet;

use chrono::NaiveDate;
use incident_core::test_support::{MemoryFeatureStore, ScriptedSource, fixed_clock, raw_incident};
use incident_core::{
    Gazetteer, IncidentPage, IncidentQuery, RawField, RawIncident, RunReporter, SyncEngine,
};
use proptest::prelude::*;

/// One generated record: identifier index and whether it is malformed.
fn record_strategy() -> impl Strategy<Value = (u8, bool)> {
    (0_u8..20, prop::bool::weighted(0.1))
}

fn build_record((index, malformed): (u8, bool)) -> RawIncident {
    let mut raw = raw_incident(&format!("UKR{index}"));
    if malformed {
        raw.latitude = Some(RawField::from("unknown"));
    }
    raw
}

fn build_pages(pages: Vec<Vec<(u8, bool)>>) -> Vec<IncidentPage> {
    pages
        .into_iter()
        .map(|records| IncidentPage::new(records.into_iter().map(build_record).collect()))
        .collect()
}

fn query() -> IncidentQuery {
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();
    IncidentQuery::new("Testland", day, day)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: counters balance and the store never receives duplicates.
    #[test]
    fn summary_balances_and_inserts_are_unique(
        page in prop::collection::vec(record_strategy(), 2..40),
        preloaded in prop::collection::hash_set(0_u8..20, 0..10),
        refused in prop::collection::hash_set(0_u8..20, 0..5),
    ) {
        let mut store = MemoryFeatureStore::with_identifiers(
            preloaded.iter().map(|index| format!("UKR{index}")),
        );
        for index in &refused {
            store = store.rejecting(&format!("UKR{index}"), "code 1000: refused");
        }
        let source = ScriptedSource::new(build_pages(vec![page]));
        let mut engine = SyncEngine::new(source, store, Gazetteer::default()).with_clock(fixed_clock);
        let mut reporter = RunReporter::new(std::io::sink());

        let state = engine.run(&query(), &mut reporter);
        prop_assert!(state.is_ok());
        let Ok(state) = state else { return Ok(()) };

        prop_assert!(state.summary.is_balanced(), "unbalanced: {:?}", state.summary);

        let inserted = engine.store().inserted_identifiers();
        let unique: HashSet<&str> = inserted.iter().copied().collect();
        prop_assert_eq!(unique.len(), inserted.len());
        for index in &preloaded {
            let identifier = format!("UKR{index}");
            prop_assert!(!unique.contains(identifier.as_str()));
        }
        prop_assert_eq!(
            u64::try_from(inserted.len()).unwrap_or(u64::MAX),
            state.summary.added
        );
    }

    /// Property: repeating a run over unchanged pages adds nothing.
    #[test]
    fn second_run_is_idempotent(
        page in prop::collection::vec(record_strategy(), 2..40),
    ) {
        let source = ScriptedSource::new(build_pages(vec![page]));
        let mut engine = SyncEngine::new(source, MemoryFeatureStore::default(), Gazetteer::default())
            .with_clock(fixed_clock);
        let mut reporter = RunReporter::new(std::io::sink());

        let first = engine.run(&query(), &mut reporter);
        let second = engine.run(&query(), &mut reporter);
        prop_assert!(first.is_ok() && second.is_ok());
        let (Ok(first), Ok(second)) = (first, second) else { return Ok(()) };

        prop_assert_eq!(second.summary.added, 0);
        prop_assert_eq!(second.summary.existing, first.summary.added + first.summary.existing);
    }
}
