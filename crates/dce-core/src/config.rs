//! Configuration structures for DCE clients.
//!
//! This module provides configuration types for connecting to DCE controllers
//! and container engines, including credentials, discovery caching and the
//! ambient Docker environment used as engine connection defaults.

use crate::client::{DCE_DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, ENGINE_DEFAULT_TIMEOUT, MINIMUM_DCE_VERSION};
use crate::version::parse_version;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default development engine endpoint used when `DCE_DEV_DOCKER_HOST` is unset.
pub const DEV_DOCKER_HOST: &str = "http://127.0.0.1:2375";

/// Credentials attached to DCE and engine requests.
///
/// A token and a username/password pair may be supplied together; both are sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    /// DCE access token
    #[serde(default)]
    pub token: Option<SecretString>,

    /// Basic auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<SecretString>,
}

impl Credentials {
    /// Create empty credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the basic auth pair.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// The access token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|secret| secret.expose_secret())
    }

    /// The password, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|secret| secret.expose_secret())
    }

    /// Username and password, when both are present.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }

    /// Hashable identity of these credentials, for cache keys.
    #[must_use]
    pub fn key(&self) -> CredentialKey {
        CredentialKey {
            token: self.token().map(str::to_string),
            username: self.username.clone(),
            password: self.password().map(str::to_string),
        }
    }
}

/// Hashable form of [`Credentials`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Configuration for a DCE API session.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DceClientConfig {
    /// Controller base URL; `http://` is assumed when no scheme is given
    #[validate(length(min = 1))]
    pub base_url: String,

    /// Credentials sent with every request
    #[serde(default, flatten)]
    pub credentials: Credentials,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent header
    #[validate(length(min = 1))]
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Oldest controller version accepted at connect time
    #[validate(custom(function = "validate_version"))]
    #[serde(default = "default_min_version")]
    pub min_version: String,
}

const fn default_timeout_secs() -> u64 {
    DCE_DEFAULT_TIMEOUT
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_min_version() -> String {
    MINIMUM_DCE_VERSION.to_string()
}

fn validate_version(raw: &str) -> Result<(), ValidationError> {
    parse_version(raw)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_version"))
}

impl DceClientConfig {
    /// Create a new configuration for the given controller URL.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            base_url: base_url.into(),
            credentials: Credentials::default(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            min_version: default_min_version(),
        };

        config.validated()
    }

    /// Validate this configuration, returning it unchanged on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the invalid fields.
    pub fn validated(self) -> Result<Self, Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        Ok(self)
    }

    /// Set the access token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_token(token);
        self
    }

    /// Set basic auth credentials.
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

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the minimum accepted controller version.
    #[must_use]
    pub fn with_min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = version.into();
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for discovery caching and derived engine clients.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DiscoveryConfig {
    /// Cache TTL in seconds
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Timeout for engine clients in seconds
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,

    /// Route local-socket engine lookups to the development endpoint
    #[serde(default)]
    pub dev: bool,
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

const fn default_engine_timeout_secs() -> u64 {
    ENGINE_DEFAULT_TIMEOUT
}

impl DiscoveryConfig {
    /// Create a new discovery configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            engine_timeout_secs: default_engine_timeout_secs(),
            dev: false,
        }
    }

    /// Set cache TTL in seconds.
    #[must_use]
    pub const fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_secs = seconds;
        self
    }

    /// Set the engine client timeout in seconds.
    #[must_use]
    pub const fn with_engine_timeout(mut self, seconds: u64) -> Self {
        self.engine_timeout_secs = seconds;
        self
    }

    /// Enable or disable development mode.
    #[must_use]
    pub const fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Get cache TTL as a Duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Get the engine timeout as a Duration.
    #[must_use]
    pub const fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine connection defaults taken from the Docker environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineEnv {
    /// `DOCKER_HOST`
    pub host: Option<String>,
    /// `DOCKER_TLS_VERIFY` is set to a non-empty value
    pub tls_verify: bool,
    /// `DOCKER_CERT_PATH`
    pub cert_path: Option<PathBuf>,
    /// `DOCKER_API_VERSION`
    pub api_version: Option<String>,
}

impl EngineEnv {
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            host: non_empty("DOCKER_HOST"),
            tls_verify: non_empty("DOCKER_TLS_VERIFY").is_some(),
            cert_path: non_empty("DOCKER_CERT_PATH").map(PathBuf::from),
            api_version: non_empty("DOCKER_API_VERSION"),
        }
    }

    /// Whether the environment asks for TLS.
    #[must_use]
    pub const fn tls_enabled(&self) -> bool {
        self.tls_verify || self.cert_path.is_some()
    }
}

/// Development engine endpoint used in place of a local socket.
#[derive(Debug, Clone)]
pub struct DevEndpoint {
    /// Engine URL
    pub host: String,
    /// Credentials for the development engine
    pub credentials: Credentials,
}

impl DevEndpoint {
    /// Read `DCE_DEV_DOCKER_HOST`, `DCE_DEV_DOCKER_USER` and `DCE_DEV_DOCKER_PASS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("DCE_DEV_DOCKER_HOST").unwrap_or_else(|| DEV_DOCKER_HOST.to_string());
        let credentials = match (lookup("DCE_DEV_DOCKER_USER"), lookup("DCE_DEV_DOCKER_PASS")) {
            (Some(user), Some(pass)) => Credentials::new().with_basic_auth(user, pass),
            _ => Credentials::new(),
        };

        Self { host, credentials }
    }
}

impl Default for DevEndpoint {
    fn default() -> Self {
        Self::from_env()
    }
}
