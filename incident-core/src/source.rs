//! Paged access to the incident source.
//!
//! The `IncidentSource` trait abstracts one page request against the source
//! API. The page size is fixed; callers stop paging once a page reports fewer
//! records than [`PAGE_SIZE`].

use chrono::NaiveDate;
use thiserror::Error;

use crate::RawIncident;

/// Records requested per page.
pub const PAGE_SIZE: usize = 500;

/// The fixed filter applied to every page of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentQuery {
    /// Country name as understood by the source.
    pub country: String,
    /// Optional event year filter.
    pub year: Option<i32>,
    /// First day of the closed date range.
    pub start_date: NaiveDate,
    /// Last day of the closed date range.
    pub end_date: NaiveDate,
}

impl IncidentQuery {
    /// Build a query for `country` between two dates, inclusive.
    #[must_use]
    pub fn new(country: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            country: country.into(),
            year: None,
            start_date,
            end_date,
        }
    }

    /// Restrict the query to one event year.
    #[must_use]
    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// The date range in the source's `start|end` notation.
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use incident_core::IncidentQuery;
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    /// let end = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date");
    /// let query = IncidentQuery::new("Ukraine", start, end);
    ///
    /// assert_eq!(query.event_date_range(), "2024-01-01|2024-01-31");
    /// ```
    #[must_use]
    pub fn event_date_range(&self) -> String {
        format!(
            "{}|{}",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}

/// One page of source records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentPage {
    /// Records on this page.
    pub records: Vec<RawIncident>,
    /// Record count reported by the source for this page.
    pub count: usize,
}

impl IncidentPage {
    /// Build a page whose reported count matches its records.
    #[must_use]
    pub fn new(records: Vec<RawIncident>) -> Self {
        let count = records.len();
        Self { records, count }
    }

    /// Override the reported count.
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Whether the page carries too few records to process.
    ///
    /// Empty and singleton pages both end the run.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.records.len() <= 1
    }

    /// Whether the source reported a partial page, meaning no further pages.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.count < PAGE_SIZE
    }
}

/// Fetch pages of incidents.
///
/// Implementations must not retry; any failure is reported to the caller,
/// which aborts the run.
pub trait IncidentSource {
    /// Fetch page `page` (1-based) of the records matching `query`.
    ///
    /// # Errors
    /// Returns a [`SourceError`] on transport, status, or decoding failures.
    fn fetch_page(&self, query: &IncidentQuery, page: u32) -> Result<IncidentPage, SourceError>;
}

impl<T: IncidentSource + ?Sized> IncidentSource for Box<T> {
    fn fetch_page(&self, query: &IncidentQuery, page: u32) -> Result<IncidentPage, SourceError> {
        (**self).fetch_page(query, page)
    }
}

/// Errors from [`IncidentSource::fetch_page`].
///
/// URLs carried by these errors never include the query string, which holds
/// the API credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL without query parameters.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The source answered with an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    HttpError {
        /// Request URL without query parameters.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    NetworkError {
        /// Request URL without query parameters.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to parse source response: {message}")]
    ParseError {
        /// Error description.
        message: String,
    },
    /// The source reported an API-level failure.
    #[error("source API rejected the request: {message}")]
    Api {
        /// Message supplied by the source.
        message: String,
    },
}
