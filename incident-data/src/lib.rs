//! HTTP adapters for the incident sync.
//!
//! Responsibilities:
//! - [`acled::AcledClient`] implements [`incident_core::IncidentSource`]
//!   against the ACLED read API.
//! - [`arcgis::ArcGisFeatureStore`] implements
//!   [`incident_core::FeatureStore`] against an ArcGIS hosted feature layer.
//!
//! Boundaries:
//! - Do not encode sync rules (live in `incident-core`).
//! - Report failures; never retry.
//!
//! Invariants:
//! - Credentials never appear in error messages or logs.
//! - No global mutable state.

pub mod acled;
pub mod arcgis;
mod http;

pub use http::{ClientBuildError, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
