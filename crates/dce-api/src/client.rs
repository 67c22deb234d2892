//! Versioned DCE controller session.
//!
//! Connecting probes `/dce/version` and falls back to `/api/version`; the first
//! prefix that answers is used for every later request, and the reported
//! `DCEVersion` is checked against the configured minimum before the session is
//! handed out.

use crate::models::{ClusterInfo, IpMap, VersionInfo};
use crate::Result;
use dce_core::client::{
    ClientConfig, DCE_DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, MINIMUM_DCE_VERSION,
    MODE_MINIMUM_VERSION,
};
use dce_core::config::{Credentials, DceClientConfig};
use dce_core::http::{expand_quoted_path, HttpSession, PREFIX_PLACEHOLDER};
use dce_core::types::Node;
use dce_core::version::{parse_version, Versioned};
use dce_core::Error;
use semver::Version;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// API path segment distinguishing controller generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiPrefix {
    /// `/dce/...`
    Dce,
    /// `/api/...`
    Api,
}

impl ApiPrefix {
    /// Prefixes in probe order.
    pub const PROBE_ORDER: [Self; 2] = [Self::Dce, Self::Api];

    /// Returns the path segment.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dce => "dce",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for ApiPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip one trailing slash and default the scheme to `http://`.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Builder for [`DceApiClient`].
#[derive(Debug, Clone)]
pub struct DceApiClientBuilder {
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
    user_agent: String,
    min_version: String,
}

impl DceApiClientBuilder {
    /// Create a builder for a controller URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::default(),
            timeout: Duration::from_secs(DCE_DEFAULT_TIMEOUT),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_version: MINIMUM_DCE_VERSION.to_string(),
        }
    }

    /// Create a builder from a validated [`DceClientConfig`].
    #[must_use]
    pub fn from_config(config: &DceClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            credentials: config.credentials.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            min_version: config.min_version.clone(),
        }
    }

    /// Set the access token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_token(token);
        self
    }

    /// Set the basic auth pair.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_basic_auth(username, password);
        self
    }

    /// Replace all credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the default request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the oldest controller version accepted.
    #[must_use]
    pub fn with_min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = version.into();
        self
    }

    /// Resolve the prefix and version, returning the session.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidEndpoint`] for an unparsable URL, with the
    /// `/api/version` probe error when neither prefix answers, and with
    /// [`Error::InvalidVersion`] when the controller is older than the minimum.
    pub async fn connect(self) -> Result<DceApiClient> {
        let base_url = normalize_base_url(&self.base_url);
        let host = Url::parse(&base_url)?.host_str().map(str::to_string);
        let min_version = parse_version(&self.min_version)?;

        let session = HttpSession::builder(base_url)
            .with_client_config(
                ClientConfig::new()
                    .with_timeout(self.timeout)
                    .with_user_agent(self.user_agent),
            )
            .with_credentials(self.credentials)
            .danger_accept_invalid_certs(true)
            .build()?;

        let (prefix, versions) = probe_prefix(&session).await?;

        let reported = versions.dce_version.as_deref().ok_or_else(|| {
            Error::InvalidVersion(format!(
                "Controller at {} did not report DCEVersion",
                session.base_url()
            ))
        })?;
        let dce_version = parse_version(reported)?;
        if dce_version < min_version {
            return Err(Error::InvalidVersion(format!(
                "DCE Version {reported} < {} is not supported",
                self.min_version
            )));
        }

        debug!(base_url = %session.base_url(), %prefix, %dce_version, "DCE session ready");

        Ok(DceApiClient {
            session,
            host,
            prefix,
            versions,
            dce_version,
            info: OnceCell::new(),
        })
    }
}

async fn probe_prefix(session: &HttpSession) -> Result<(ApiPrefix, VersionInfo)> {
    let mut last_error = None;
    for prefix in ApiPrefix::PROBE_ORDER {
        let url = format!("{}/{prefix}/version", session.base_url());
        match session.get_json::<VersionInfo>(&url).await {
            Ok(versions) => return Ok((prefix, versions)),
            Err(err) => {
                debug!(%prefix, error = %err, "version probe failed");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::DiscoveryFailed("no API prefix to probe".to_string())))
}

/// Authenticated, version-checked session against one DCE controller.
#[derive(Debug)]
pub struct DceApiClient {
    session: HttpSession,
    host: Option<String>,
    prefix: ApiPrefix,
    versions: VersionInfo,
    dce_version: Version,
    info: OnceCell<ClusterInfo>,
}

impl DceApiClient {
    /// Start a builder for a controller URL.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> DceApiClientBuilder {
        DceApiClientBuilder::new(base_url)
    }

    /// Connect using a [`DceClientConfig`].
    ///
    /// # Errors
    ///
    /// See [`DceApiClientBuilder::connect`].
    pub async fn from_config(config: &DceClientConfig) -> Result<Self> {
        DceApiClientBuilder::from_config(config).connect().await
    }

    /// Normalized controller URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// Host name of the controller URL.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Resolved API prefix.
    #[must_use]
    pub const fn prefix(&self) -> ApiPrefix {
        self.prefix
    }

    /// Credentials sent with every request.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        self.session.credentials()
    }

    /// Default request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.session.timeout()
    }

    /// The underlying HTTP session, for requests this client has no method for.
    #[must_use]
    pub const fn session(&self) -> &HttpSession {
        &self.session
    }

    /// Build an absolute URL from a path template.
    ///
    /// `{@}` is replaced with the resolved prefix and each `{}` with the next
    /// argument, percent-encoded like engine paths.
    #[must_use]
    pub fn url(&self, template: &str, args: &[&str]) -> String {
        let path = template.replace(PREFIX_PLACEHOLDER, self.prefix.as_str());
        format!("{}{}", self.base_url(), expand_quoted_path(&path, args))
    }

    /// Node proxy URL forwarding engine requests to the node at `address`.
    #[must_use]
    pub fn node_docker_url(&self, address: &str) -> String {
        self.url("/{@}/nodes/{}/docker", &[address])
    }

    /// Version payload captured when the session was constructed.
    #[must_use]
    pub const fn versions(&self) -> &VersionInfo {
        &self.versions
    }

    /// Controller version resolved when the session was constructed.
    #[must_use]
    pub const fn dce_version(&self) -> &Version {
        &self.dce_version
    }

    /// Fetch the version payload.
    pub async fn version(&self) -> Result<VersionInfo> {
        self.session.get_json(&self.url("/{@}/version", &[])).await
    }

    /// Liveness check; a healthy controller answers `OK`.
    pub async fn ping(&self) -> Result<String> {
        self.session.get_text(&self.url("/{@}/ping", &[])).await
    }

    /// Controller clock as fractional Unix seconds.
    pub async fn now(&self) -> Result<f64> {
        self.session.get_json(&self.url("/{@}/now", &[])).await
    }

    /// Cluster info, fetched on first use and cached for the session lifetime.
    ///
    /// # Errors
    ///
    /// Request failures are returned and not cached; the next call retries.
    pub async fn info(&self) -> Result<&ClusterInfo> {
        self.info
            .get_or_try_init(|| async {
                self.session
                    .get_json::<ClusterInfo>(&self.url("/{@}/info", &[]))
                    .await
            })
            .await
    }

    /// Cluster identifier.
    pub async fn cluster_uuid(&self) -> Result<Option<String>> {
        Ok(self.info().await?.cluster_uuid.clone())
    }

    /// Virtualization technology.
    pub async fn virt_tech(&self) -> Result<Option<String>> {
        Ok(self.info().await?.virt_tech.clone())
    }

    /// Virtualization technology type.
    pub async fn virt_tech_type(&self) -> Result<Option<String>> {
        Ok(self.info().await?.virt_tech_type.clone())
    }

    /// Event stream room.
    pub async fn stream_room(&self) -> Result<Option<String>> {
        Ok(self.info().await?.stream_room.clone())
    }

    /// Cluster mode, `docker` or `kubernetes`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidVersion`] on controllers older than 2.7.13.
    pub async fn mode(&self) -> Result<Option<String>> {
        self.require_minimum("mode", MODE_MINIMUM_VERSION)?;
        Ok(self.info().await?.mode.clone())
    }

    /// Container network driver.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidVersion`] on controllers older than 2.7.13.
    pub async fn network_driver(&self) -> Result<Option<String>> {
        self.require_minimum("network_driver", MODE_MINIMUM_VERSION)?;
        Ok(self.info().await?.network_driver.clone())
    }

    /// Cluster nodes as seen by the controller.
    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.session.get_json(&self.url("/{@}/nodes", &[])).await
    }

    /// Node id to address records, in controller order.
    pub async fn ip_map(&self) -> Result<IpMap> {
        let raw: Map<String, Value> = self.session.get_json(&self.url("/{@}/ip_map", &[])).await?;
        IpMap::from_map(raw)
    }
}

impl Versioned for DceApiClient {
    fn server_version(&self) -> &Version {
        &self.dce_version
    }
}

impl fmt::Display for DceApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DCEClient '{}'>", self.host.as_deref().unwrap_or_default())
    }
}
