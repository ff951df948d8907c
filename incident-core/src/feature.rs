//! Destination rows for the geospatial feature store.

use chrono::{DateTime, Utc};
use geo::Point;

use crate::{Gazetteer, IncidentRecord};

/// Provenance written to every inserted row.
pub const PROVENANCE: &str = "Armed Conflict Location & Event Data Project (ACLED); acleddata.com";

/// Status tag written to every inserted row.
pub const STATUS_TAG: &str = "external_acled";

/// An incident shaped for insertion into the feature store.
///
/// The attributes mirror [`IncidentRecord`] with `admin1` already normalised;
/// the store-local fields record when and from where the row was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Validated incident attributes.
    pub incident: IncidentRecord,
    /// Point geometry, `x = longitude` and `y = latitude`.
    pub geometry: Point<f64>,
    /// Time at which the row was assembled.
    pub date_fetched: DateTime<Utc>,
    /// Fixed provenance string, see [`PROVENANCE`].
    pub source_details: &'static str,
    /// Fixed status tag, see [`STATUS_TAG`].
    pub status: &'static str,
}

impl FeatureRecord {
    /// Assemble a row from a validated incident.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use incident_core::{FeatureRecord, Gazetteer, IncidentRecord, STATUS_TAG};
    /// use incident_core::test_support::raw_incident;
    ///
    /// let incident = IncidentRecord::try_from(raw_incident("UKR1"))?;
    /// let gazetteer = Gazetteer::from_pairs([("Kyiv City", "Kyiv")]);
    /// let feature = FeatureRecord::assemble(incident, &gazetteer, Utc::now());
    ///
    /// assert_eq!(feature.identifier(), "UKR1");
    /// assert_eq!(feature.incident.admin1, "Kyiv");
    /// assert_eq!(feature.status, STATUS_TAG);
    /// # Ok::<(), incident_core::RecordError>(())
    /// ```
    #[must_use]
    pub fn assemble(
        mut incident: IncidentRecord,
        gazetteer: &Gazetteer,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let admin1 = gazetteer.normalise(&incident.admin1).to_owned();
        incident.admin1 = admin1;
        let geometry = incident.location_point();
        Self {
            incident,
            geometry,
            date_fetched: fetched_at,
            source_details: PROVENANCE,
            status: STATUS_TAG,
        }
    }

    /// The deduplication key.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.incident.event_id_cnty
    }
}
