//! Core domain types for synchronising conflict incidents into a feature
//! store.
//!
//! The crate owns everything that does not touch the network:
//! - [`RawIncident`] and [`IncidentRecord`] model the source records before and
//!   after validation at the ingestion boundary.
//! - [`FeatureRecord`] is the destination row, carrying a WGS84 point geometry
//!   (`x = longitude`, `y = latitude`).
//! - [`IncidentSource`] and [`FeatureStore`] are the seams implemented by the
//!   HTTP adapters in `incident-data` and by the doubles in `test_support`.
//! - [`SyncEngine`] drives paging, deduplication and insertion, returning the
//!   run-scoped [`RunState`].
//! - [`RunReporter`] writes per-page, per-failure and end-of-run lines to the
//!   log and to a caller-supplied writer.
//!
//! Invariants:
//! - No global mutable state; all run state is owned by the caller.
//! - An identifier present in the run's [`IdentifierSet`] is never inserted.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod feature;
mod gazetteer;
mod incident;
mod report;
mod source;
mod store;
pub mod sync;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use feature::{FeatureRecord, PROVENANCE, STATUS_TAG};
pub use gazetteer::{Gazetteer, GazetteerError};
pub use incident::{IncidentRecord, RawField, RawIncident, RecordError};
pub use report::{RunReporter, RunSummary};
pub use source::{IncidentPage, IncidentQuery, IncidentSource, PAGE_SIZE, SourceError};
pub use store::{FeatureStore, IdentifierSet, InsertOutcome, StoreError};
pub use sync::{RunState, SyncEngine, SyncError};
