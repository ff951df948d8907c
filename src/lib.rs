//! Facade crate for the incident synchronisation tool.
//!
//! This crate re-exports the core domain types and exposes the HTTP-backed
//! source and store adapters behind the `http` feature flag.

#![forbid(unsafe_code)]

pub use incident_core::{
    FeatureRecord, FeatureStore, Gazetteer, GazetteerError, IdentifierSet, IncidentPage,
    IncidentQuery, IncidentRecord, IncidentSource, InsertOutcome, PAGE_SIZE, RawIncident,
    RecordError, RunReporter, RunState, RunSummary, SourceError, StoreError, SyncEngine,
    SyncError,
};

#[cfg(feature = "http")]
pub use incident_data::acled::{AcledClient, AcledClientConfig};

#[cfg(feature = "http")]
pub use incident_data::arcgis::{ArcGisConfig, ArcGisFeatureStore};
