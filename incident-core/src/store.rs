//! Write access to the destination feature store.
//!
//! The `FeatureStore` trait exposes the two operations the sync needs: a
//! one-off snapshot of every identifier already stored, and a single-row
//! insert. There is no upsert; deduplication happens against the snapshot.

use std::collections::HashSet;

use thiserror::Error;

use crate::FeatureRecord;

/// Identifiers known to be present in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    ids: HashSet<String>,
}

impl IdentifierSet {
    /// Whether `identifier` is present.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.ids.contains(identifier)
    }

    /// Record `identifier`, returning `false` when it was already present.
    pub fn insert(&mut self, identifier: impl Into<String>) -> bool {
        self.ids.insert(identifier.into())
    }

    /// Number of identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for IdentifierSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.ids.extend(iter.into_iter().map(Into::into));
    }
}

/// Result of a single insert the store answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The store accepted the row.
    Added,
    /// The store refused the row.
    Rejected {
        /// Error detail reported by the store.
        detail: String,
    },
}

/// Access to the destination feature layer.
pub trait FeatureStore {
    /// Read the identifier column of every stored row.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the layer cannot be queried.
    fn load_existing_identifiers(&self) -> Result<IdentifierSet, StoreError>;

    /// Submit one row.
    ///
    /// A refusal by the store is an [`InsertOutcome::Rejected`], not an error.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the request itself fails.
    fn insert(&mut self, feature: &FeatureRecord) -> Result<InsertOutcome, StoreError>;
}

impl<T: FeatureStore + ?Sized> FeatureStore for Box<T> {
    fn load_existing_identifiers(&self) -> Result<IdentifierSet, StoreError> {
        (**self).load_existing_identifiers()
    }

    fn insert(&mut self, feature: &FeatureRecord) -> Result<InsertOutcome, StoreError> {
        (**self).insert(feature)
    }
}

/// Errors raised while talking to the feature store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The service answered with an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    HttpError {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    NetworkError {
        /// Request URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to parse feature store response: {message}")]
    ParseError {
        /// Error description.
        message: String,
    },
    /// The portal refused the supplied credentials.
    #[error("portal rejected the credentials: {message}")]
    Authentication {
        /// Message supplied by the portal.
        message: String,
    },
    /// The configured item does not resolve to a feature layer.
    #[error("item {item_id} is not a usable feature service: {message}")]
    ItemNotFound {
        /// Configured item identifier.
        item_id: String,
        /// Reason the item could not be used.
        message: String,
    },
    /// The service reported an error inside a successful HTTP response.
    #[error("feature service error {code}: {message}")]
    Service {
        /// Service error code.
        code: i64,
        /// Service error message.
        message: String,
    },
}
