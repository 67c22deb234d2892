//! Registry of engine clients keyed by connection parameters.
//!
//! Identical parameters always resolve to the same shared client. In
//! development mode, lookups for a local socket are redirected to the
//! development engine and are not stored.

use crate::client::{is_local_socket, DockerApiClient, TlsOptions, DEFAULT_DOCKER_HOST};
use crate::docker::DockerClient;
use crate::Result;
use dce_core::client::ENGINE_DEFAULT_TIMEOUT;
use dce_core::config::{CredentialKey, Credentials, DevEndpoint, EngineEnv};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Connection parameters of an engine client.
#[derive(Debug, Clone)]
pub struct EngineClientParams {
    /// Engine URL
    pub base_url: String,
    /// Credentials sent with every request
    pub credentials: Credentials,
    /// Known host name of the engine's node
    pub hostname: Option<String>,
    /// Default request timeout
    pub timeout: Duration,
    /// Talk TLS to the engine
    pub tls: bool,
}

impl EngineClientParams {
    /// Parameters for an engine URL with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::default(),
            hostname: None,
            timeout: Duration::from_secs(ENGINE_DEFAULT_TIMEOUT),
            tls: false,
        }
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the known host name.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable TLS.
    #[must_use]
    pub const fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    fn key(&self) -> EngineClientKey {
        EngineClientKey {
            base_url: self.base_url.clone(),
            credentials: self.credentials.key(),
            hostname: self.hostname.clone(),
            timeout: self.timeout,
            tls: self.tls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EngineClientKey {
    base_url: String,
    credentials: CredentialKey,
    hostname: Option<String>,
    timeout: Duration,
    tls: bool,
}

/// Shared engine clients, one per distinct [`EngineClientParams`].
#[derive(Debug)]
pub struct EngineRegistry {
    env: EngineEnv,
    dev: Option<DevEndpoint>,
    clients: Mutex<HashMap<EngineClientKey, Arc<DockerApiClient>>>,
}

impl EngineRegistry {
    /// Create an empty registry using `env` for engine defaults.
    #[must_use]
    pub fn new(env: EngineEnv) -> Self {
        Self {
            env,
            dev: None,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(EngineEnv::from_env())
    }

    /// Redirect local-socket lookups to a development engine.
    #[must_use]
    pub fn with_dev_endpoint(mut self, dev: DevEndpoint) -> Self {
        self.dev = Some(dev);
        self
    }

    /// Engine defaults in effect.
    #[must_use]
    pub const fn env(&self) -> &EngineEnv {
        &self.env
    }

    /// Whether development redirection is active.
    #[must_use]
    pub const fn is_dev(&self) -> bool {
        self.dev.is_some()
    }

    /// Parameters of the local engine: `DOCKER_HOST`, else the local socket.
    #[must_use]
    pub fn local_params(&self) -> EngineClientParams {
        let host = self
            .env
            .host
            .clone()
            .unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string());
        EngineClientParams::new(host).with_tls(self.env.tls_enabled())
    }

    /// Return the shared client for `params`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns the construction error of a new client; see
    /// [`DockerApiClientBuilder::build`](crate::DockerApiClientBuilder::build).
    pub fn engine_client(&self, params: &EngineClientParams) -> Result<Arc<DockerApiClient>> {
        if let Some(dev) = &self.dev {
            if is_local_socket(&params.base_url) {
                debug!(base_url = %params.base_url, dev_host = %dev.host, "using development engine");
                let client = DockerApiClient::builder(dev.host.clone())
                    .with_credentials(dev.credentials.clone())
                    .with_timeout(params.timeout)
                    .build()?;
                return Ok(Arc::new(client));
            }
        }

        let key = params.key();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(self.build(params)?);
        debug!(base_url = %params.base_url, registered = clients.len() + 1, "engine client registered");
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Typed wrapper around [`engine_client`](Self::engine_client).
    ///
    /// # Errors
    ///
    /// See [`engine_client`](Self::engine_client).
    pub fn docker_client(&self, params: &EngineClientParams) -> Result<DockerClient> {
        self.engine_client(params).map(DockerClient::new)
    }

    /// Number of stored clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no client has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build(&self, params: &EngineClientParams) -> Result<DockerApiClient> {
        let mut builder = DockerApiClient::builder(params.base_url.clone())
            .with_credentials(params.credentials.clone())
            .with_timeout(params.timeout);

        if let Some(hostname) = &params.hostname {
            builder = builder.with_hostname(hostname.clone());
        }
        if let Some(version) = &self.env.api_version {
            builder = builder.with_api_version(version.clone());
        }
        if params.tls || self.env.tls_enabled() {
            builder = builder.with_tls(TlsOptions {
                verify: self.env.tls_verify,
                cert_path: self.env.cert_path.clone(),
            });
        }

        builder.build()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new(EngineEnv::default())
    }
}
