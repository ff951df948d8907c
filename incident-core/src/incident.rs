//! Incident records at the ingestion boundary.
//!
//! The source API returns loosely typed JSON: most numbers arrive as strings
//! and optional columns may be absent or `null`. [`RawIncident`] captures that
//! shape verbatim and the `TryFrom<RawIncident>` conversion for
//! [`IncidentRecord`] coerces it into validated fields, rejecting records that
//! cannot be represented instead of failing the whole run.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Calendar format used by the source for `event_date`.
const EVENT_DATE_FORMAT: &str = "%Y-%m-%d";

const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;

/// A column value exactly as encoded by the source API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    /// A JSON integer.
    Integer(i64),
    /// A JSON floating-point number.
    Float(f64),
    /// A JSON string. The source encodes most numeric columns this way.
    Text(String),
    /// A JSON boolean.
    Flag(bool),
    /// An array or object. Never valid for a known column; kept so that one
    /// such record is quarantined instead of failing the page.
    Structured(Value),
}

impl RawField {
    /// Render the value as text, whatever its JSON type.
    ///
    /// # Examples
    /// ```
    /// use incident_core::RawField;
    ///
    /// assert_eq!(RawField::from("Kyiv").to_text(), "Kyiv");
    /// assert_eq!(RawField::Integer(804).to_text(), "804");
    /// ```
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Flag(value) => value.to_string(),
            Self::Structured(value) => value.to_string(),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
            Self::Float(_) | Self::Flag(_) | Self::Structured(_) => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        let value = match self {
            Self::Float(value) => Some(*value),
            // Anything outside i32 is far beyond the coordinate ranges anyway.
            Self::Integer(value) => i32::try_from(*value).ok().map(f64::from),
            Self::Text(value) => value.trim().parse().ok(),
            Self::Flag(_) | Self::Structured(_) => None,
        };
        value.filter(|number| number.is_finite())
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RawField {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RawField {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// One incident as returned by the source API, before validation.
///
/// Unknown columns are ignored; every known column is optional so that a
/// missing value surfaces as a [`RecordError`] rather than a parse failure of
/// the entire page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIncident {
    /// Cross-source identifier used for deduplication.
    pub event_id_cnty: Option<RawField>,
    /// Event date as `YYYY-MM-DD`.
    pub event_date: Option<RawField>,
    /// Event year.
    pub year: Option<RawField>,
    /// Precision code of the event date.
    pub time_precision: Option<RawField>,
    /// Disorder classification label.
    pub disorder_type: Option<RawField>,
    /// Event type.
    pub event_type: Option<RawField>,
    /// Event sub-type.
    pub sub_event_type: Option<RawField>,
    /// First actor.
    pub actor1: Option<RawField>,
    /// Actors associated with the first actor.
    pub assoc_actor_1: Option<RawField>,
    /// Interaction code of the first actor.
    pub inter1: Option<RawField>,
    /// Second actor.
    pub actor2: Option<RawField>,
    /// Actors associated with the second actor.
    pub assoc_actor_2: Option<RawField>,
    /// Interaction code of the second actor.
    pub inter2: Option<RawField>,
    /// Combined interaction code.
    pub interaction: Option<RawField>,
    /// Civilian-targeting flag.
    pub civilian_targeting: Option<RawField>,
    /// Numeric ISO country code.
    pub iso: Option<RawField>,
    /// Country name.
    pub country: Option<RawField>,
    /// First-level administrative region.
    pub admin1: Option<RawField>,
    /// Second-level administrative region.
    pub admin2: Option<RawField>,
    /// Third-level administrative region.
    pub admin3: Option<RawField>,
    /// Free-text location.
    pub location: Option<RawField>,
    /// WGS84 latitude.
    pub latitude: Option<RawField>,
    /// WGS84 longitude.
    pub longitude: Option<RawField>,
    /// Precision code of the coordinates.
    pub geo_precision: Option<RawField>,
    /// Reporting source.
    pub source: Option<RawField>,
    /// Scale of the reporting source.
    pub source_scale: Option<RawField>,
    /// Free-text notes.
    pub notes: Option<RawField>,
    /// Reported fatalities.
    pub fatalities: Option<RawField>,
    /// Tag list.
    pub tags: Option<RawField>,
    /// Unix timestamp at which the source ingested the event.
    pub timestamp: Option<RawField>,
}

impl RawIncident {
    /// Build a raw incident carrying only an identifier.
    ///
    /// Mostly useful for tests and for constructing records field by field.
    #[must_use]
    pub fn with_identifier(identifier: &str) -> Self {
        Self {
            event_id_cnty: Some(RawField::from(identifier)),
            ..Self::default()
        }
    }

    /// Identifier as text, if a scalar one was supplied.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        self.event_id_cnty
            .as_ref()
            .filter(|field| !matches!(field, RawField::Structured(_)))
            .map(RawField::to_text)
    }
}

/// Reasons a raw incident is quarantined at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record carries no usable `event_id_cnty`.
    #[error("record has no event_id_cnty identifier")]
    MissingIdentifier,
    /// A required column is absent or `null`.
    #[error("{identifier}: required field `{field}` is missing")]
    MissingField {
        /// Identifier of the affected record.
        identifier: String,
        /// Name of the missing column.
        field: &'static str,
    },
    /// A column is present but cannot be coerced.
    #[error("{identifier}: field `{field}` value {value:?} is not {expected}")]
    InvalidField {
        /// Identifier of the affected record.
        identifier: String,
        /// Name of the offending column.
        field: &'static str,
        /// The raw value, rendered as text.
        value: String,
        /// Description of the accepted values.
        expected: &'static str,
    },
}

impl RecordError {
    /// Identifier of the affected record, when one was available.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::MissingIdentifier => None,
            Self::MissingField { identifier, .. } | Self::InvalidField { identifier, .. } => {
                Some(identifier)
            }
        }
    }
}

/// A validated incident.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    /// Cross-source identifier, unique across the destination store.
    pub event_id_cnty: String,
    /// Numeric ISO country code.
    pub iso: i32,
    /// Event date.
    pub event_date: NaiveDate,
    /// Event year.
    pub year: i32,
    /// Precision code of the event date.
    pub time_precision: i32,
    /// Disorder classification label.
    pub disorder_type: String,
    /// Event type.
    pub event_type: String,
    /// Event sub-type.
    pub sub_event_type: String,
    /// First actor.
    pub actor1: String,
    /// Actors associated with the first actor.
    pub assoc_actor_1: String,
    /// Interaction code of the first actor.
    pub inter1: i32,
    /// Second actor.
    pub actor2: String,
    /// Actors associated with the second actor.
    pub assoc_actor_2: String,
    /// Interaction code of the second actor.
    pub inter2: i32,
    /// Combined interaction code.
    pub interaction: i32,
    /// Civilian-targeting flag as reported by the source.
    pub civilian_targeting: String,
    /// Country name.
    pub country: String,
    /// First-level administrative region, as reported by the source.
    pub admin1: String,
    /// Second-level administrative region.
    pub admin2: String,
    /// Third-level administrative region.
    pub admin3: String,
    /// Free-text location.
    pub location: String,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// Precision code of the coordinates.
    pub geo_precision: i32,
    /// Reporting source.
    pub source: String,
    /// Scale of the reporting source.
    pub source_scale: String,
    /// Free-text notes.
    pub notes: String,
    /// Reported fatalities.
    pub fatalities: u32,
    /// Tag list as a single string.
    pub tags: String,
    /// Unix timestamp at which the source ingested the event.
    pub timestamp: Option<i64>,
}

impl IncidentRecord {
    /// Point geometry with `x = longitude` and `y = latitude`.
    #[must_use]
    pub fn location_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl TryFrom<RawIncident> for IncidentRecord {
    type Error = RecordError;

    fn try_from(raw: RawIncident) -> Result<Self, Self::Error> {
        let event_id_cnty = raw
            .identifier()
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::MissingIdentifier)?;
        let fields = FieldReader {
            identifier: &event_id_cnty,
        };

        let record = Self {
            iso: fields.integer("iso", raw.iso.as_ref())?,
            event_date: fields.date("event_date", raw.event_date.as_ref())?,
            year: fields.integer("year", raw.year.as_ref())?,
            time_precision: fields.integer("time_precision", raw.time_precision.as_ref())?,
            disorder_type: fields.text("disorder_type", raw.disorder_type)?,
            event_type: fields.text("event_type", raw.event_type)?,
            sub_event_type: fields.text("sub_event_type", raw.sub_event_type)?,
            actor1: fields.text("actor1", raw.actor1)?,
            assoc_actor_1: fields.text("assoc_actor_1", raw.assoc_actor_1)?,
            inter1: fields.integer("inter1", raw.inter1.as_ref())?,
            actor2: fields.text("actor2", raw.actor2)?,
            assoc_actor_2: fields.text("assoc_actor_2", raw.assoc_actor_2)?,
            inter2: fields.integer("inter2", raw.inter2.as_ref())?,
            interaction: fields.integer("interaction", raw.interaction.as_ref())?,
            civilian_targeting: fields.text("civilian_targeting", raw.civilian_targeting)?,
            country: fields.text("country", raw.country)?,
            admin1: fields.text("admin1", raw.admin1)?,
            admin2: fields.text("admin2", raw.admin2)?,
            admin3: fields.text("admin3", raw.admin3)?,
            location: fields.text("location", raw.location)?,
            latitude: fields.coordinate("latitude", raw.latitude.as_ref(), &LATITUDE_RANGE)?,
            longitude: fields.coordinate("longitude", raw.longitude.as_ref(), &LONGITUDE_RANGE)?,
            geo_precision: fields.integer("geo_precision", raw.geo_precision.as_ref())?,
            source: fields.text("source", raw.source)?,
            source_scale: fields.text("source_scale", raw.source_scale)?,
            notes: fields.text("notes", raw.notes)?,
            fatalities: fields.integer("fatalities", raw.fatalities.as_ref())?,
            tags: fields.text("tags", raw.tags)?,
            timestamp: fields.optional_integer("timestamp", raw.timestamp.as_ref())?,
            event_id_cnty,
        };
        Ok(record)
    }
}

/// Coerces individual columns, attributing failures to one record.
struct FieldReader<'a> {
    identifier: &'a str,
}

impl FieldReader<'_> {
    fn required<'v>(
        &self,
        field: &'static str,
        value: Option<&'v RawField>,
    ) -> Result<&'v RawField, RecordError> {
        value.ok_or_else(|| RecordError::MissingField {
            identifier: self.identifier.to_owned(),
            field,
        })
    }

    fn invalid(&self, field: &'static str, value: &RawField, expected: &'static str) -> RecordError {
        RecordError::InvalidField {
            identifier: self.identifier.to_owned(),
            field,
            value: value.to_text(),
            expected,
        }
    }

    /// Free-text column; absent becomes empty and scalars are rendered.
    fn text(&self, field: &'static str, value: Option<RawField>) -> Result<String, RecordError> {
        match value {
            None => Ok(String::new()),
            Some(RawField::Text(value)) => Ok(value),
            Some(raw @ RawField::Structured(_)) => {
                Err(self.invalid(field, &raw, "a scalar value"))
            }
            Some(other) => Ok(other.to_text()),
        }
    }

    fn integer<T>(&self, field: &'static str, value: Option<&RawField>) -> Result<T, RecordError>
    where
        T: TryFrom<i64>,
    {
        let raw = self.required(field, value)?;
        raw.as_integer()
            .and_then(|number| T::try_from(number).ok())
            .ok_or_else(|| self.invalid(field, raw, "an integer in range"))
    }

    fn optional_integer(
        &self,
        field: &'static str,
        value: Option<&RawField>,
    ) -> Result<Option<i64>, RecordError> {
        match value {
            None => Ok(None),
            Some(RawField::Text(blank)) if blank.trim().is_empty() => Ok(None),
            Some(raw) => raw
                .as_integer()
                .map(Some)
                .ok_or_else(|| self.invalid(field, raw, "an integer")),
        }
    }

    fn coordinate(
        &self,
        field: &'static str,
        value: Option<&RawField>,
        range: &RangeInclusive<f64>,
    ) -> Result<f64, RecordError> {
        let raw = self.required(field, value)?;
        raw.as_float()
            .filter(|degrees| range.contains(degrees))
            .ok_or_else(|| self.invalid(field, raw, "a coordinate in range"))
    }

    fn date(&self, field: &'static str, value: Option<&RawField>) -> Result<NaiveDate, RecordError> {
        let raw = self.required(field, value)?;
        let RawField::Text(date) = raw else {
            return Err(self.invalid(field, raw, "a YYYY-MM-DD date"));
        };
        NaiveDate::parse_from_str(date.trim(), EVENT_DATE_FORMAT)
            .map_err(|_| self.invalid(field, raw, "a YYYY-MM-DD date"))
    }
}
