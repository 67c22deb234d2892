//! HTTP client settings and well-known DCE constants.
//!
//! This module provides the transport configuration shared by the DCE API and
//! container-engine clients, along with the default timeouts, user agents and
//! version boundaries used across the SDK.

use std::time::Duration;

/// Default timeout for DCE API requests (seconds)
pub const DCE_DEFAULT_TIMEOUT: u64 = 60;

/// Default timeout for container-engine requests (seconds)
pub const ENGINE_DEFAULT_TIMEOUT: u64 = 180;

/// Timeout used when connecting to an endpoint (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 25;

/// Oldest DCE release the SDK talks to.
pub const MINIMUM_DCE_VERSION: &str = "2.6.0";

/// DCE release the SDK is developed against.
pub const DEFAULT_DCE_VERSION: &str = "2.7.14";

/// First DCE release that reports the cluster mode and network driver.
pub const MODE_MINIMUM_VERSION: &str = "2.7.13";

/// Cluster mode backed by Docker Swarm.
pub const DOCKER_MODE: &str = "docker";

/// Cluster mode backed by Kubernetes.
pub const KUBE_MODE: &str = "kubernetes";

/// Every cluster mode a DCE controller may report.
pub const DCE_MODES: [&str; 2] = [DOCKER_MODE, KUBE_MODE];

/// Default user agent for DCE API sessions.
pub const DEFAULT_USER_AGENT: &str = concat!("dce-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// Default user agent for container-engine clients.
pub const ENGINE_USER_AGENT: &str = concat!("dce-docker/", env!("CARGO_PKG_VERSION"));

/// Header carrying a DCE access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-DCE-Access-Token";

/// Header carrying encoded registry credentials for engine requests.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// HTTP transport configuration.
///
/// Configures timeouts and connection pooling for a single client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// User agent sent with every request
    pub user_agent: String,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DCE_DEFAULT_TIMEOUT),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
