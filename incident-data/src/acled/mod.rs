//! `IncidentSource` backed by the ACLED read API.
//!
//! Every page is one `GET` against the configured endpoint. Credentials are
//! sent as the `key` and `email` query parameters alongside the filter
//! (`country`, optional `year`, an `event_date` range with
//! `event_date_where=BETWEEN`), the 1-based `page`, and `limit` fixed to
//! [`PAGE_SIZE`]. Failures are reported, never retried.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use incident_core::{IncidentQuery, IncidentSource};
//! use incident_data::acled::{AcledClient, AcledClientConfig};
//!
//! let config = AcledClientConfig::new("https://api.acleddata.com/acled/read", "token", "me@example.org");
//! let client = AcledClient::with_config(config)?;
//! let start = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
//! let end = NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date");
//!
//! let page = client.fetch_page(&IncidentQuery::new("Ukraine", start, end), 1)?;
//! println!("{} incidents", page.records.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod wire;

use std::time::Duration;

use incident_core::{IncidentPage, IncidentQuery, IncidentSource, PAGE_SIZE, SourceError};
use url::Url;

use crate::http::{
    BlockingClient, ClientBuildError, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, TransportFailure,
    parse_base_url, redact,
};
use wire::ReadResponse;

/// Configuration for [`AcledClient`].
#[derive(Clone)]
pub struct AcledClientConfig {
    /// Read endpoint, e.g. `https://api.acleddata.com/acled/read`.
    pub api_url: String,
    /// API access key.
    pub access_token: String,
    /// Account email paired with the key.
    pub email: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl std::fmt::Debug for AcledClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcledClientConfig")
            .field("api_url", &self.api_url)
            .field("access_token", &"<redacted>")
            .field("email", &self.email)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl AcledClientConfig {
    /// Create a configuration with the default timeout and user agent.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        access_token: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            access_token: access_token.into(),
            email: email.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Blocking ACLED client.
#[derive(Debug)]
pub struct AcledClient {
    http: BlockingClient,
    endpoint: Url,
    access_token: String,
    email: String,
}

impl AcledClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the endpoint is not an absolute URL or
    /// when the HTTP client or runtime cannot be built.
    pub fn with_config(config: AcledClientConfig) -> Result<Self, ClientBuildError> {
        let endpoint = parse_base_url(&config.api_url)?;
        let http = BlockingClient::new(&config.user_agent, config.timeout)?;
        Ok(Self {
            http,
            endpoint,
            access_token: config.access_token,
            email: config.email,
        })
    }

    /// Full request URL for `page` of `query`, credentials included.
    fn page_url(&self, query: &IncidentQuery, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("key", &self.access_token)
                .append_pair("email", &self.email)
                .append_pair("terms", "accept")
                .append_pair("country", &query.country);
            if let Some(year) = query.year {
                pairs.append_pair("year", &year.to_string());
            }
            pairs
                .append_pair("event_date", &query.event_date_range())
                .append_pair("event_date_where", "BETWEEN")
                .append_pair("page", &page.to_string())
                .append_pair("limit", &PAGE_SIZE.to_string());
        }
        url
    }

    async fn fetch_page_async(
        &self,
        query: &IncidentQuery,
        page: u32,
    ) -> Result<IncidentPage, SourceError> {
        let url = self.page_url(query, page);
        log::debug!("requesting page {page} from {}", redact(&url));

        let response = self
            .http
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(err, &url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(err, &url))?;

        let body: ReadResponse =
            response
                .json()
                .await
                .map_err(|err| SourceError::ParseError {
                    message: err.without_url().to_string(),
                })?;

        convert_response(body)
    }

    fn convert_reqwest_error(&self, error: reqwest::Error, url: &Url) -> SourceError {
        let failure = TransportFailure::classify(&error);
        let url = redact(url);
        // reqwest renders the full URL, key included, unless stripped.
        let message = error.without_url().to_string();
        match failure {
            TransportFailure::Timeout => SourceError::Timeout {
                url,
                timeout_secs: self.http.timeout.as_secs(),
            },
            TransportFailure::Status(status) => SourceError::HttpError {
                url,
                status,
                message,
            },
            TransportFailure::Network => SourceError::NetworkError { url, message },
        }
    }
}

fn convert_response(body: ReadResponse) -> Result<IncidentPage, SourceError> {
    if let Some(message) = body.failure() {
        return Err(SourceError::Api { message });
    }
    Ok(body.into_page())
}

impl IncidentSource for AcledClient {
    fn fetch_page(&self, query: &IncidentQuery, page: u32) -> Result<IncidentPage, SourceError> {
        self.http.block_on(self.fetch_page_async(query, page))
    }
}
