//! Raw container-engine API client.
//!
//! [`DockerApiClient`] speaks the Docker-compatible engine API, either directly
//! or through the DCE node proxy (`/{prefix}/nodes/{addr}/docker`). It shares
//! the authenticated [`HttpSession`] and failure classification with the DCE
//! session, and creating one performs no network I/O.

use crate::models::{EngineVersion, ServiceCreated, SystemInfo};
use crate::Result;
use async_trait::async_trait;
use dce_core::client::{
    ClientConfig, ENGINE_DEFAULT_TIMEOUT, ENGINE_USER_AGENT, REGISTRY_AUTH_HEADER,
};
use dce_core::config::Credentials;
use dce_core::http::{expand_quoted_path, HttpSession};
use dce_core::types::Node;
use dce_core::Error;
use reqwest::{Certificate, Identity};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Engine endpoint used when neither `DOCKER_HOST` nor an explicit URL is given.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Capabilities of an engine client that cluster discovery depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Base URL of the engine.
    fn endpoint(&self) -> String;

    /// Raw inspect document of a service.
    async fn inspect_service(&self, service: &str) -> Result<Value>;

    /// Swarm nodes known to the engine.
    async fn nodes(&self) -> Result<Vec<Node>>;

    /// Engine system information.
    async fn info(&self) -> Result<SystemInfo>;
}

/// Returns true when `url` points at a local Unix socket.
#[must_use]
pub fn is_local_socket(url: &str) -> bool {
    url.ends_with(".sock") || url.starts_with("unix://") || url.starts_with("http+unix://")
}

/// Turn an engine host into an HTTP base URL.
///
/// `tcp://` hosts and bare `host:port` pairs become `http://` (or `https://`
/// when `tls` is set).
///
/// # Errors
///
/// Returns [`Error::ConfigError`] for Unix socket endpoints and
/// [`Error::InvalidEndpoint`] for anything that does not parse as a URL.
pub fn engine_base_url(raw: &str, tls: bool) -> Result<String> {
    let raw = raw.trim();
    if is_local_socket(raw) {
        return Err(Error::ConfigError(format!(
            "Unix socket engine endpoint `{raw}` is not supported, use a TCP endpoint"
        )));
    }

    let scheme = if tls { "https" } else { "http" };
    let trimmed = raw.strip_suffix('/').unwrap_or(raw);
    let base_url = if let Some(rest) = trimmed.strip_prefix("tcp://") {
        format!("{scheme}://{rest}")
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("{scheme}://{trimmed}")
    };

    Url::parse(&base_url)?;
    Ok(base_url)
}

/// TLS material for an engine endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Verify the engine certificate
    pub verify: bool,
    /// Directory holding `ca.pem`, `cert.pem` and `key.pem`
    pub cert_path: Option<PathBuf>,
}

impl TlsOptions {
    fn read(path: &Path) -> Result<Option<Vec<u8>>> {
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(path).map(Some).map_err(|err| {
            Error::ConfigError(format!("Failed to read {}: {err}", path.display()))
        })
    }

    fn root_certificate(&self) -> Result<Option<Certificate>> {
        let Some(dir) = &self.cert_path else {
            return Ok(None);
        };
        Self::read(&dir.join("ca.pem"))?
            .map(|pem| {
                Certificate::from_pem(&pem)
                    .map_err(|err| Error::ConfigError(format!("Invalid engine CA certificate: {err}")))
            })
            .transpose()
    }

    fn identity(&self) -> Result<Option<Identity>> {
        let Some(dir) = &self.cert_path else {
            return Ok(None);
        };
        let (Some(mut pem), Some(key)) = (
            Self::read(&dir.join("cert.pem"))?,
            Self::read(&dir.join("key.pem"))?,
        ) else {
            return Ok(None);
        };
        pem.push(b'\n');
        pem.extend_from_slice(&key);
        Identity::from_pem(&pem)
            .map(Some)
            .map_err(|err| Error::ConfigError(format!("Invalid engine client certificate: {err}")))
    }
}

/// Builder for [`DockerApiClient`].
#[derive(Debug, Clone)]
pub struct DockerApiClientBuilder {
    base_url: String,
    credentials: Credentials,
    hostname: Option<String>,
    timeout: Duration,
    user_agent: String,
    api_version: Option<String>,
    tls: Option<TlsOptions>,
}

impl DockerApiClientBuilder {
    /// Create a builder for an engine URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::default(),
            hostname: None,
            timeout: Duration::from_secs(ENGINE_DEFAULT_TIMEOUT),
            user_agent: ENGINE_USER_AGENT.to_string(),
            api_version: None,
            tls: None,
        }
    }

    /// Attach credentials to every request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Use a known host name instead of asking the engine.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into()).filter(|name: &String| !name.is_empty());
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

    /// Pin the engine API version; paths are prefixed with `/v<version>`.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Talk TLS to the engine.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Finalise the builder and create the [`DockerApiClient`].
    ///
    /// # Errors
    ///
    /// See [`engine_base_url`]; unreadable or invalid TLS material is
    /// [`Error::ConfigError`].
    pub fn build(self) -> Result<DockerApiClient> {
        let base_url = engine_base_url(&self.base_url, self.tls.is_some())?;
        let verify = self.tls.as_ref().is_some_and(|tls| tls.verify);

        let mut session = HttpSession::builder(base_url)
            .with_client_config(
                ClientConfig::new()
                    .with_timeout(self.timeout)
                    .with_user_agent(self.user_agent),
            )
            .with_credentials(self.credentials)
            .danger_accept_invalid_certs(!verify);

        if let Some(tls) = &self.tls {
            if let Some(certificate) = tls.root_certificate()? {
                session = session.with_root_certificate(certificate);
            }
            if let Some(identity) = tls.identity()? {
                session = session.with_identity(identity);
            }
        }

        let session = session.build()?;
        debug!(base_url = %session.base_url(), api_version = ?self.api_version, "engine client created");

        Ok(DockerApiClient {
            session,
            api_version: self.api_version,
            hostname: OnceCell::new_with(self.hostname),
        })
    }
}

/// Client for the container-engine API of one endpoint.
#[derive(Debug)]
pub struct DockerApiClient {
    session: HttpSession,
    api_version: Option<String>,
    hostname: OnceCell<String>,
}

impl DockerApiClient {
    /// Start a builder for an engine URL.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> DockerApiClientBuilder {
        DockerApiClientBuilder::new(base_url)
    }

    /// Engine base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// Pinned API version, if any.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
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

    /// Build an absolute URL from a path template.
    ///
    /// Each `{}` is replaced with the next argument, percent-encoded.
    #[must_use]
    pub fn url(&self, template: &str, args: &[&str]) -> String {
        let path = expand_quoted_path(template, args);
        match &self.api_version {
            Some(version) => format!("{}/v{version}{path}", self.base_url()),
            None => format!("{}{path}", self.base_url()),
        }
    }

    /// Liveness check; a healthy engine answers `OK`.
    pub async fn ping(&self) -> Result<String> {
        self.session.get_text(&self.url("/_ping", &[])).await
    }

    /// Engine version information.
    pub async fn version(&self) -> Result<EngineVersion> {
        self.session.get_json(&self.url("/version", &[])).await
    }

    /// Engine system information.
    pub async fn info(&self) -> Result<SystemInfo> {
        self.session.get_json(&self.url("/info", &[])).await
    }

    /// Host name of the engine's node.
    ///
    /// Uses the host name given at construction, otherwise asks the engine once.
    pub async fn hostname(&self) -> Result<&str> {
        self.hostname
            .get_or_try_init(|| async { Ok::<_, Error>(self.info().await?.name) })
            .await
            .map(String::as_str)
    }

    /// Raw inspect document of a service.
    pub async fn inspect_service(&self, service: &str) -> Result<Value> {
        self.session
            .get_json(&self.url("/services/{}", &[service]))
            .await
    }

    /// Raw documents of every service.
    pub async fn services(&self) -> Result<Vec<Value>> {
        self.session.get_json(&self.url("/services", &[])).await
    }

    /// Swarm nodes.
    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.session.get_json(&self.url("/nodes", &[])).await
    }

    /// Create a service from a raw spec.
    ///
    /// `registry_auth` is passed through as the `X-Registry-Auth` header.
    pub async fn create_service_raw(
        &self,
        spec: &Value,
        registry_auth: Option<&str>,
    ) -> Result<ServiceCreated> {
        let mut request = self
            .session
            .post(&self.url("/services/create", &[]))
            .json(spec);
        if let Some(auth) = registry_auth {
            request = request.header(REGISTRY_AUTH_HEADER, auth);
        }
        self.session.json(request).await
    }

    /// Replace the spec of a service at the given object version.
    pub async fn update_service_raw(&self, service: &str, version: u64, spec: &Value) -> Result<String> {
        let version = version.to_string();
        let request = self
            .session
            .post(&self.url("/services/{}/update?version={}", &[service, &version]))
            .json(spec);
        self.session.text(request).await
    }
}

#[async_trait]
impl EngineApi for DockerApiClient {
    fn endpoint(&self) -> String {
        self.base_url().to_string()
    }

    async fn inspect_service(&self, service: &str) -> Result<Value> {
        Self::inspect_service(self, service).await
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        Self::nodes(self).await
    }

    async fn info(&self) -> Result<SystemInfo> {
        Self::info(self).await
    }
}

impl fmt::Display for DockerApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DCEDockerClient '{}'>", self.base_url())
    }
}
