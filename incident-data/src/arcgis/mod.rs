//! `FeatureStore` backed by an ArcGIS hosted feature layer.
//!
//! [`ArcGisFeatureStore::connect`] signs in to the portal with
//! `generateToken`, resolves the configured item to its feature service and
//! targets layer `0`. The identifier snapshot pages through the layer's
//! `query` endpoint while `exceededTransferLimit` is set; each insert is one
//! `applyEdits` call carrying a single feature.
//!
//! The token is sent as a form or query parameter and never appears in the
//! URLs carried by errors.

mod wire;

use std::time::Duration;

use incident_core::{FeatureRecord, FeatureStore, IdentifierSet, InsertOutcome, StoreError};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::http::{
    BlockingClient, ClientBuildError, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, TransportFailure,
    parse_base_url, redact,
};
use wire::{ApplyEditsResponse, ItemResponse, QueryResponse, ServiceError, TokenResponse};
pub use wire::{FeatureAttributes, FeaturePayload, PointGeometry, SpatialReference, WGS84_WKID};

/// Token lifetime requested from the portal, in minutes.
const DEFAULT_TOKEN_MINUTES: u32 = 120;

/// Rows requested per identifier query page.
const QUERY_PAGE_SIZE: usize = 2000;

/// Identifier column of the destination layer.
const IDENTIFIER_FIELD: &str = "event_id_cnty";

/// Object ID column of hosted layers; orders identifier pages stably.
const OBJECT_ID_FIELD: &str = "OBJECTID";

/// Service error codes that invalidate the session rather than one edit.
const SESSION_ERROR_CODES: [i64; 4] = [401, 403, 498, 499];

/// Configuration for [`ArcGisFeatureStore`].
#[derive(Clone)]
pub struct ArcGisConfig {
    /// Portal root, e.g. `https://www.arcgis.com` or `https://host/portal`.
    pub portal: String,
    /// Portal user name.
    pub username: String,
    /// Portal password.
    pub password: String,
    /// Item ID of the hosted feature layer.
    pub item_id: String,
    /// Requested token lifetime in minutes.
    pub token_minutes: u32,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl std::fmt::Debug for ArcGisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcGisConfig")
            .field("portal", &self.portal)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("item_id", &self.item_id)
            .field("token_minutes", &self.token_minutes)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ArcGisConfig {
    /// Create a configuration with default timeout, token lifetime and user
    /// agent.
    #[must_use]
    pub fn new(
        portal: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        item_id: impl Into<String>,
    ) -> Self {
        Self {
            portal: portal.into(),
            username: username.into(),
            password: password.into(),
            item_id: item_id.into(),
            token_minutes: DEFAULT_TOKEN_MINUTES,
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

    /// Set the requested token lifetime.
    #[must_use]
    pub fn with_token_minutes(mut self, minutes: u32) -> Self {
        self.token_minutes = minutes;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Errors raised by [`ArcGisFeatureStore::connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The HTTP client could not be built.
    #[error(transparent)]
    Build(#[from] ClientBuildError),
    /// The portal refused the sign-in or the item could not be resolved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Blocking client for one feature layer.
#[derive(Debug)]
pub struct ArcGisFeatureStore {
    http: BlockingClient,
    layer: Url,
    token: String,
}

impl ArcGisFeatureStore {
    /// Sign in and resolve the configured item to its first layer.
    ///
    /// # Errors
    /// Returns [`ConnectError::Build`] for an invalid portal URL and
    /// [`ConnectError::Store`] when sign-in or item resolution fails.
    pub fn connect(config: &ArcGisConfig) -> Result<Self, ConnectError> {
        let portal = parse_base_url(&config.portal)?;
        let http = BlockingClient::new(&config.user_agent, config.timeout)?;
        let session = Session { http: &http };

        log::info!("establishing connection to {portal}");
        let token = http.block_on(session.generate_token(&portal, config))?;
        let layer = http.block_on(session.resolve_layer(&portal, &config.item_id, &token))?;
        log::info!("connection established; target layer {layer}");

        Ok(Self { http, layer, token })
    }

    /// URL of the target layer.
    #[must_use]
    pub const fn layer_url(&self) -> &Url {
        &self.layer
    }

    fn session(&self) -> Session<'_> {
        Session { http: &self.http }
    }

    async fn load_identifiers_async(&self) -> Result<IdentifierSet, StoreError> {
        let url = endpoint(&self.layer, "query");
        let session = self.session();
        let mut ids = IdentifierSet::default();
        let mut offset = 0_usize;
        loop {
            let offset_param = offset.to_string();
            let count_param = QUERY_PAGE_SIZE.to_string();
            let params = identifier_query(&offset_param, &count_param, &self.token);
            let response: QueryResponse = session.post_form(&url, &params).await?;
            if let Some(error) = response.error {
                return Err(service_error(&error));
            }
            let received = response.features.len();
            ids.extend(
                response
                    .features
                    .into_iter()
                    .filter_map(|feature| feature.attributes.event_id_cnty),
            );
            if !response.exceeded_transfer_limit || received == 0 {
                break;
            }
            offset = offset.saturating_add(received);
        }
        log::info!("{} identifiers already stored", ids.len());
        Ok(ids)
    }

    async fn insert_async(&self, feature: &FeatureRecord) -> Result<InsertOutcome, StoreError> {
        let url = endpoint(&self.layer, "applyEdits");
        let adds = serde_json::to_string(&[FeaturePayload::from(feature)]).map_err(|err| {
            StoreError::ParseError {
                message: format!("failed to encode {}: {err}", feature.identifier()),
            }
        })?;
        let params = [
            ("adds", adds.as_str()),
            ("f", "json"),
            ("token", self.token.as_str()),
        ];
        let response: ApplyEditsResponse = self.session().post_form(&url, &params).await?;
        insert_outcome(response)
    }
}

impl FeatureStore for ArcGisFeatureStore {
    fn load_existing_identifiers(&self) -> Result<IdentifierSet, StoreError> {
        self.http.block_on(self.load_identifiers_async())
    }

    fn insert(&mut self, feature: &FeatureRecord) -> Result<InsertOutcome, StoreError> {
        self.http.block_on(self.insert_async(feature))
    }
}

/// Request helpers shared by connection setup and the store itself.
struct Session<'a> {
    http: &'a BlockingClient,
}

impl Session<'_> {
    async fn generate_token(
        &self,
        portal: &Url,
        config: &ArcGisConfig,
    ) -> Result<String, StoreError> {
        let url = endpoint(portal, "sharing/rest/generateToken");
        let expiration = config.token_minutes.to_string();
        let params = [
            ("username", config.username.as_str()),
            ("password", config.password.as_str()),
            ("client", "referer"),
            ("referer", portal.as_str()),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ];
        let response: TokenResponse = self.post_form(&url, &params).await?;
        token_from(response)
    }

    async fn resolve_layer(
        &self,
        portal: &Url,
        item_id: &str,
        token: &str,
    ) -> Result<Url, StoreError> {
        let url = endpoint(portal, &format!("sharing/rest/content/items/{item_id}"));
        let params = [("f", "json"), ("token", token)];
        let response: ItemResponse = self.get(&url, &params).await?;
        layer_from(item_id, response)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: &[(&str, &str)],
    ) -> Result<T, StoreError> {
        let request = self.http.client.get(url.clone()).query(params);
        self.send(request, url).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: &[(&str, &str)],
    ) -> Result<T, StoreError> {
        let request = self.http.client.post(url.clone()).form(params);
        self.send(request, url).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<T, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(err, url))?;
        response.json().await.map_err(|err| StoreError::ParseError {
            message: err.without_url().to_string(),
        })
    }

    fn convert_reqwest_error(&self, error: reqwest::Error, url: &Url) -> StoreError {
        let failure = TransportFailure::classify(&error);
        let url = redact(url);
        let message = error.without_url().to_string();
        match failure {
            TransportFailure::Timeout => StoreError::Timeout {
                url,
                timeout_secs: self.http.timeout.as_secs(),
            },
            TransportFailure::Status(status) => StoreError::HttpError {
                url,
                status,
                message,
            },
            TransportFailure::Network => StoreError::NetworkError { url, message },
        }
    }
}

/// Append `path` to `base`, keeping any existing path prefix.
fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    {
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
    }
    url
}

fn service_error(error: &ServiceError) -> StoreError {
    StoreError::Service {
        code: error.code,
        message: error.describe(),
    }
}

fn token_from(response: TokenResponse) -> Result<String, StoreError> {
    if let Some(error) = response.error {
        return Err(StoreError::Authentication {
            message: error.describe(),
        });
    }
    response
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| StoreError::Authentication {
            message: "portal returned no token".to_owned(),
        })
}

fn layer_from(item_id: &str, response: ItemResponse) -> Result<Url, StoreError> {
    let not_found = |message: String| StoreError::ItemNotFound {
        item_id: item_id.to_owned(),
        message,
    };
    if let Some(error) = response.error {
        return Err(not_found(error.describe()));
    }
    if let Some(item_type) = response.item_type.as_deref()
        && item_type != "Feature Service"
    {
        return Err(not_found(format!("item is a {item_type}")));
    }
    let service = response
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| not_found("item has no service URL".to_owned()))?;
    let service = Url::parse(service.trim_end_matches('/'))
        .map_err(|err| not_found(format!("invalid service URL {service:?}: {err}")))?;
    Ok(endpoint(&service, "0"))
}

/// Form parameters for one page of the identifier snapshot.
fn identifier_query<'a>(
    offset: &'a str,
    count: &'a str,
    token: &'a str,
) -> [(&'static str, &'a str); 8] {
    [
        ("where", "1=1"),
        ("outFields", IDENTIFIER_FIELD),
        ("orderByFields", OBJECT_ID_FIELD),
        ("returnGeometry", "false"),
        ("resultOffset", offset),
        ("resultRecordCount", count),
        ("f", "json"),
        ("token", token),
    ]
}

/// Interpret an `applyEdits` reply for a single added feature.
///
/// A top-level error is fatal only when it invalidates the session; any
/// other code is the service refusing this one feature.
fn insert_outcome(response: ApplyEditsResponse) -> Result<InsertOutcome, StoreError> {
    if let Some(error) = response.error {
        if SESSION_ERROR_CODES.contains(&error.code) {
            return Err(service_error(&error));
        }
        return Ok(InsertOutcome::Rejected {
            detail: format!("code {}: {}", error.code, error.describe()),
        });
    }
    let result = response
        .add_results
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::ParseError {
            message: "applyEdits response has no addResults".to_owned(),
        })?;
    if result.success {
        if let Some(object_id) = result.object_id {
            log::debug!("stored as object {object_id}");
        }
        return Ok(InsertOutcome::Added);
    }
    let detail = result.error.map_or_else(
        || "store reported failure without detail".to_owned(),
        |error| format!("code {}: {}", error.code, error.description),
    );
    Ok(InsertOutcome::Rejected { detail })
}
