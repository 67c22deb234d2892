//! Discovery state owned by the caller.
//!
//! A [`DiscoveryContext`] owns the engine-client registry and the TTL caches
//! that memoize discovery results. Results are keyed by the caller's
//! credentials and the endpoint of the engine used for discovery.

use crate::client::DceClient;
use crate::discovery;
use crate::Result;
use dce_api::DceApiClient;
use dce_core::cache::{CacheStats, TtlCache};
use dce_core::config::{
    CredentialKey, Credentials, DceClientConfig, DevEndpoint, DiscoveryConfig,
};
use dce_docker::{DockerApiClient, DockerClient, EngineApi, EngineRegistry};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiscoveryKey {
    credentials: CredentialKey,
    engine: String,
}

impl DiscoveryKey {
    fn new(credentials: &Credentials, engine: &dyn EngineApi) -> Self {
        Self {
            credentials: credentials.key(),
            engine: engine.endpoint(),
        }
    }
}

/// Engine-client registry plus memoized discovery results.
pub struct DiscoveryContext {
    config: DiscoveryConfig,
    registry: Arc<EngineRegistry>,
    local_sessions: TtlCache<DiscoveryKey, Arc<DceApiClient>>,
    node_engines: TtlCache<DiscoveryKey, Vec<Arc<DockerApiClient>>>,
}

impl DiscoveryContext {
    /// Create a context whose registry reads the process environment.
    ///
    /// With `config.dev` set, local-socket engines are redirected to the
    /// development endpoint from `DCE_DEV_DOCKER_*`.
    ///
    /// # Errors
    ///
    /// Returns [`dce_core::Error::ConfigError`] for an invalid configuration.
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let mut registry = EngineRegistry::from_env();
        if config.dev {
            registry = registry.with_dev_endpoint(DevEndpoint::from_env());
        }
        Self::with_registry(config, registry)
    }

    /// Create a context around an existing registry.
    ///
    /// # Errors
    ///
    /// Returns [`dce_core::Error::ConfigError`] for an invalid configuration.
    pub fn with_registry(config: DiscoveryConfig, registry: EngineRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, registry))
    }

    fn assemble(config: DiscoveryConfig, registry: EngineRegistry) -> Self {
        let ttl = config.cache_ttl();
        Self {
            config,
            registry: Arc::new(registry),
            local_sessions: TtlCache::new(ttl),
            node_engines: TtlCache::new(ttl),
        }
    }

    /// Discovery settings.
    #[must_use]
    pub const fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// The shared engine-client registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Client for the local engine (`DOCKER_HOST`, else the local socket).
    ///
    /// # Errors
    ///
    /// A Unix socket endpoint outside development mode is
    /// [`dce_core::Error::ConfigError`].
    pub fn default_engine(&self) -> Result<Arc<DockerApiClient>> {
        let params = self
            .registry
            .local_params()
            .with_timeout(self.config.engine_timeout());
        self.registry.engine_client(&params)
    }

    /// Connect a full client for a controller.
    ///
    /// # Errors
    ///
    /// See [`DceApiClient::from_config`].
    pub async fn connect(&self, config: &DceClientConfig) -> Result<DceClient> {
        let api = DceApiClient::from_config(config).await?;
        Ok(DceClient::from_parts(Arc::new(api), Arc::clone(&self.registry)))
    }

    /// Session against the controller next to `engine` (or the local engine).
    ///
    /// Memoized for the cache TTL per credentials and engine endpoint.
    ///
    /// # Errors
    ///
    /// See [`discovery::local_api_session`]; failures are not cached.
    pub async fn local_api_session(
        &self,
        credentials: &Credentials,
        engine: Option<&dyn EngineApi>,
    ) -> Result<Arc<DceApiClient>> {
        let local;
        let engine = match engine {
            Some(engine) => engine,
            None => {
                local = self.default_engine()?;
                &*local as &dyn EngineApi
            }
        };

        let key = DiscoveryKey::new(credentials, engine);
        debug!(engine = %key.engine, "resolving local controller session");
        self.local_sessions
            .get_or_try_insert_with(key, || async {
                discovery::local_api_session(engine, credentials)
                    .await
                    .map(Arc::new)
            })
            .await
    }

    /// Full client for the controller next to `engine` (or the local engine).
    ///
    /// Shares the memoized session of [`local_api_session`](Self::local_api_session).
    ///
    /// # Errors
    ///
    /// See [`local_api_session`](Self::local_api_session).
    pub async fn local_client(
        &self,
        credentials: &Credentials,
        engine: Option<&dyn EngineApi>,
    ) -> Result<DceClient> {
        let api = self.local_api_session(credentials, engine).await?;
        Ok(DceClient::from_parts(api, Arc::clone(&self.registry)))
    }

    /// Raw engine clients for every cluster node, in controller IP map order.
    ///
    /// Clients come from the registry and carry `credentials`. Memoized for the
    /// cache TTL per credentials and engine endpoint.
    ///
    /// # Errors
    ///
    /// See [`discovery::node_engine_params`]; failures are not cached.
    pub async fn node_engine_api_clients(
        &self,
        credentials: &Credentials,
        engine: Option<&dyn EngineApi>,
    ) -> Result<Vec<Arc<DockerApiClient>>> {
        let local;
        let engine = match engine {
            Some(engine) => engine,
            None => {
                local = self.default_engine()?;
                &*local as &dyn EngineApi
            }
        };

        let key = DiscoveryKey::new(credentials, engine);
        debug!(engine = %key.engine, "resolving node engines");
        self.node_engines
            .get_or_try_insert_with(key, || async {
                let params =
                    discovery::node_engine_params(engine, credentials, self.config.engine_timeout())
                        .await?;
                params
                    .iter()
                    .map(|params| self.registry.engine_client(params))
                    .collect::<Result<Vec<_>>>()
            })
            .await
    }

    /// Typed engine clients for every cluster node.
    ///
    /// # Errors
    ///
    /// See [`node_engine_api_clients`](Self::node_engine_api_clients).
    pub async fn node_engine_clients(
        &self,
        credentials: &Credentials,
        engine: Option<&dyn EngineApi>,
    ) -> Result<Vec<DockerClient>> {
        Ok(self
            .node_engine_api_clients(credentials, engine)
            .await?
            .into_iter()
            .map(DockerClient::new)
            .collect())
    }

    /// Hit and miss counters of the local session and node engine caches.
    #[must_use]
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.local_sessions.stats(), self.node_engines.stats())
    }

    /// Drop every memoized discovery result.
    pub async fn clear_cache(&self) {
        self.local_sessions.clear().await;
        self.node_engines.clear().await;
    }
}

impl Default for DiscoveryContext {
    fn default() -> Self {
        Self::assemble(DiscoveryConfig::default(), EngineRegistry::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dce_core::config::EngineEnv;
    use dce_core::Error;

    fn context() -> DiscoveryContext {
        DiscoveryContext::with_registry(
            DiscoveryConfig::new(),
            EngineRegistry::new(EngineEnv::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = DiscoveryContext::with_registry(
            DiscoveryConfig::new().with_cache_ttl(0),
            EngineRegistry::default(),
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_default_engine_needs_tcp_outside_dev_mode() {
        let err = context().default_engine().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_default_engine_is_shared() {
        let env = EngineEnv {
            host: Some("tcp://10.0.0.5:2375".to_string()),
            ..EngineEnv::default()
        };
        let context =
            DiscoveryContext::with_registry(DiscoveryConfig::new(), EngineRegistry::new(env))
                .unwrap();

        let first = context.default_engine().unwrap();
        let second = context.default_engine().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.timeout(), context.config().engine_timeout());
    }

    #[tokio::test]
    async fn test_local_lookup_without_engine_fails_fast() {
        let context = context();
        let result = context.local_api_session(&Credentials::new(), None).await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
        assert_eq!(context.cache_stats().0.misses, 0);
    }
}
