//! Shared plumbing for the blocking HTTP adapters.
//!
//! The core traits are synchronous. Each adapter owns a current-thread Tokio
//! runtime and blocks on its async `reqwest` calls, reusing a caller's
//! multi-threaded runtime when one is already running.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

/// Default user agent for outgoing requests.
pub const DEFAULT_USER_AGENT: &str = concat!("incident-sync/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Errors raised while building an HTTP adapter.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime")]
    Runtime(#[source] std::io::Error),
    /// A configured URL is not absolute.
    #[error("invalid URL {url:?}")]
    InvalidUrl {
        /// The rejected value.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
}

/// How a request failed before a usable body arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportFailure {
    Timeout,
    Status(u16),
    Network,
}

impl TransportFailure {
    pub(crate) fn classify(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        error
            .status()
            .map_or(Self::Network, |status| Self::Status(status.as_u16()))
    }
}

/// An HTTP client paired with the runtime that drives it.
pub(crate) struct BlockingClient {
    pub(crate) client: Client,
    pub(crate) timeout: Duration,
    runtime: Runtime,
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("client", &self.client)
            .field("timeout", &self.timeout)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl BlockingClient {
    pub(crate) fn new(user_agent: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(ClientBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientBuildError::Runtime)?;
        Ok(Self {
            client,
            timeout,
            runtime,
        })
    }

    /// Run `future` to completion on a suitable runtime.
    ///
    /// `block_in_place` needs a multi-threaded runtime; from a current-thread
    /// runtime the adapter falls back to its own, which can deadlock if the
    /// caller's runtime drives IO this request depends on.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}

/// Parse `raw` as an absolute URL, trimming any trailing slash.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ClientBuildError> {
    Url::parse(raw.trim().trim_end_matches('/')).map_err(|source| ClientBuildError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })
}

/// Render `url` without its query string or fragment.
///
/// Credentials travel as query parameters, so error messages must only ever
/// carry this form.
pub(crate) fn redact(url: &Url) -> String {
    let mut bare = url.clone();
    bare.set_query(None);
    bare.set_fragment(None);
    bare.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn redact_drops_credentials() {
        let url = Url::parse("https://api.example.test/acled/read?key=secret&email=a%40b.test")
            .expect("valid url");
        assert_eq!(redact(&url), "https://api.example.test/acled/read");
    }

    #[rstest]
    #[case("https://portal.example.test/", "https://portal.example.test/")]
    #[case(" https://portal.example.test/arcgis/ ", "https://portal.example.test/arcgis")]
    fn base_urls_are_normalised(#[case] raw: &str, #[case] expected: &str) {
        let url = parse_base_url(raw).expect("valid url");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    fn relative_urls_are_rejected() {
        let err = parse_base_url("acled/read").expect_err("relative url");
        assert!(matches!(err, ClientBuildError::InvalidUrl { .. }));
    }

    #[rstest]
    fn client_builds_with_timeout() {
        let client = BlockingClient::new(DEFAULT_USER_AGENT, Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }
}
