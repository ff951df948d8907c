//! Request and response bodies of the ArcGIS REST API.
//!
//! Every response may carry an `error` object in place of its payload, even
//! with a 200 status. Field names of [`FeatureAttributes`] follow the
//! destination layer's schema, misspellings included.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use incident_core::FeatureRecord;
use serde::{Deserialize, Serialize};

/// Spatial reference of every geometry sent: WGS84.
pub const WGS84_WKID: u32 = 4326;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ServiceError {
    #[serde(default)]
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) details: Vec<String>,
}

impl ServiceError {
    pub(crate) fn describe(&self) -> String {
        if self.details.is_empty() {
            self.message.clone()
        } else {
            format!("{} ({})", self.message, self.details.join("; "))
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) token: Option<String>,
    pub(crate) error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemResponse {
    pub(crate) url: Option<String>,
    #[serde(rename = "type")]
    pub(crate) item_type: Option<String>,
    pub(crate) error: Option<ServiceError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    pub(crate) features: Vec<QueryFeature>,
    pub(crate) exceeded_transfer_limit: bool,
    pub(crate) error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryFeature {
    pub(crate) attributes: IdentifierAttributes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdentifierAttributes {
    pub(crate) event_id_cnty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ApplyEditsResponse {
    pub(crate) add_results: Vec<EditResult>,
    pub(crate) error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EditResult {
    #[serde(default)]
    pub(crate) success: bool,
    pub(crate) object_id: Option<i64>,
    pub(crate) error: Option<EditError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditError {
    #[serde(default)]
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) description: String,
}

/// One feature in an `applyEdits` `adds` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturePayload {
    /// Attribute values keyed by layer field name.
    pub attributes: FeatureAttributes,
    /// Point geometry.
    pub geometry: PointGeometry,
}

/// Esri JSON point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointGeometry {
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
    /// Coordinate system of `x` and `y`.
    #[serde(rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

/// Esri spatial reference by well-known ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpatialReference {
    /// Well-known ID.
    pub wkid: u32,
}

/// Attribute columns of the destination layer.
///
/// Dates are epoch milliseconds, as ArcGIS date fields expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureAttributes {
    pub iso: i32,
    pub event_id_cnty: String,
    pub event_date: i64,
    pub year: i32,
    pub time_precision: i32,
    pub event_type: String,
    pub sub_event_type: String,
    pub actor1: String,
    pub assoc_actor_1: String,
    pub inter1: i32,
    pub actor2: String,
    pub assoc_actor_2: String,
    pub inter2: i32,
    pub interaction: i32,
    pub country: String,
    pub admin1: String,
    pub admin2: String,
    pub admin3: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geo_precision: i32,
    pub source: String,
    pub notes: String,
    pub disorder_type: String,
    pub civilian_targeting: String,
    pub tags: String,
    pub fatalities: u32,
    /// Source ingestion time in Unix seconds.
    #[serde(rename = "recevied_time")]
    pub received_time: Option<i64>,
    #[serde(rename = "source_deteails")]
    pub source_details: String,
    pub date_fetched: i64,
    pub source_scale: String,
    pub status: String,
}

impl From<&FeatureRecord> for FeaturePayload {
    fn from(feature: &FeatureRecord) -> Self {
        let incident = &feature.incident;
        Self {
            attributes: FeatureAttributes {
                iso: incident.iso,
                event_id_cnty: incident.event_id_cnty.clone(),
                event_date: date_millis(incident.event_date),
                year: incident.year,
                time_precision: incident.time_precision,
                event_type: incident.event_type.clone(),
                sub_event_type: incident.sub_event_type.clone(),
                actor1: incident.actor1.clone(),
                assoc_actor_1: incident.assoc_actor_1.clone(),
                inter1: incident.inter1,
                actor2: incident.actor2.clone(),
                assoc_actor_2: incident.assoc_actor_2.clone(),
                inter2: incident.inter2,
                interaction: incident.interaction,
                country: incident.country.clone(),
                admin1: incident.admin1.clone(),
                admin2: incident.admin2.clone(),
                admin3: incident.admin3.clone(),
                location: incident.location.clone(),
                latitude: incident.latitude,
                longitude: incident.longitude,
                geo_precision: incident.geo_precision,
                source: incident.source.clone(),
                notes: incident.notes.clone(),
                disorder_type: incident.disorder_type.clone(),
                civilian_targeting: incident.civilian_targeting.clone(),
                tags: incident.tags.clone(),
                fatalities: incident.fatalities,
                received_time: incident.timestamp,
                source_details: feature.source_details.to_owned(),
                date_fetched: timestamp_millis(feature.date_fetched),
                source_scale: incident.source_scale.clone(),
                status: feature.status.to_owned(),
            },
            geometry: PointGeometry {
                x: feature.geometry.x(),
                y: feature.geometry.y(),
                spatial_reference: SpatialReference { wkid: WGS84_WKID },
            },
        }
    }
}

fn date_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn timestamp_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
