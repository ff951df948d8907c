//! Normalisation of first-level administrative region names.
//!
//! The source labels regions with its own spellings; the destination layer
//! expects the names used by the national gazetteer. The mapping is loaded
//! once at startup and consulted for every record.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a gazetteer mapping.
#[derive(Debug, Error)]
pub enum GazetteerError {
    /// The mapping file could not be read.
    #[error("failed to read gazetteer at {path}")]
    Read {
        /// Requested mapping path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// The mapping file is not valid gazetteer JSON.
    #[error("failed to parse gazetteer at {path}")]
    ParseFile {
        /// Requested mapping path.
        path: Utf8PathBuf,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// An in-memory mapping is not valid gazetteer JSON.
    #[error("failed to parse gazetteer JSON")]
    Parse {
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

/// Accepted on-disk layouts.
///
/// The table form is a column-oriented export with the normalised names
/// under `admin1_name`; any other columns are ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GazetteerFile {
    Table { admin1_name: HashMap<String, String> },
    Flat(HashMap<String, String>),
}

impl GazetteerFile {
    fn into_mapping(self) -> HashMap<String, String> {
        match self {
            Self::Table { admin1_name } => admin1_name,
            Self::Flat(mapping) => mapping,
        }
    }
}

/// Static lookup from source admin1 labels to normalised names.
///
/// # Examples
/// ```
/// use incident_core::Gazetteer;
///
/// let gazetteer = Gazetteer::from_json_str(r#"{"admin1_name": {"Kyiv City": "Kyiv"}}"#)?;
///
/// assert_eq!(gazetteer.normalise("Kyiv City"), "Kyiv");
/// assert_eq!(gazetteer.normalise("Lviv"), "Lviv");
/// # Ok::<(), incident_core::GazetteerError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gazetteer {
    admin1: HashMap<String, String>,
}

impl Gazetteer {
    /// Build a gazetteer from `(raw, normalised)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            admin1: pairs
                .into_iter()
                .map(|(raw, name)| (raw.into(), name.into()))
                .collect(),
        }
    }

    /// Parse a gazetteer from JSON text.
    ///
    /// # Errors
    /// Returns [`GazetteerError::Parse`] when the text is neither the table
    /// nor the flat layout.
    pub fn from_json_str(json: &str) -> Result<Self, GazetteerError> {
        let file: GazetteerFile =
            serde_json::from_str(json).map_err(|source| GazetteerError::Parse { source })?;
        Ok(Self {
            admin1: file.into_mapping(),
        })
    }

    /// Load a gazetteer from a JSON file.
    ///
    /// # Errors
    /// Returns [`GazetteerError::Read`] when the file cannot be read and
    /// [`GazetteerError::ParseFile`] when it is malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, GazetteerError> {
        let json = incident_fs::read_to_string(path).map_err(|source| GazetteerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: GazetteerFile =
            serde_json::from_str(&json).map_err(|source| GazetteerError::ParseFile {
                path: path.to_path_buf(),
                source,
            })?;
        let gazetteer = Self {
            admin1: file.into_mapping(),
        };
        log::info!("loaded {} gazetteer entries from {path}", gazetteer.len());
        Ok(gazetteer)
    }

    /// Map a raw admin1 label to its normalised name.
    ///
    /// Labels absent from the mapping are returned unchanged.
    #[must_use]
    pub fn normalise<'a>(&'a self, raw: &'a str) -> &'a str {
        self.admin1.get(raw).map_or(raw, String::as_str)
    }

    /// Number of mapped labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.admin1.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admin1.is_empty()
    }
}
