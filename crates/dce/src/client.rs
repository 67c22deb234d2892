//! Full DCE client: controller session plus engine accessors.

use crate::Result;
use dce_api::DceApiClient;
use dce_docker::{DockerApiClient, DockerClient, EngineClientParams, EngineRegistry};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A controller session that can also hand out engine clients.
///
/// Dereferences to [`DceApiClient`] for every controller operation. Engine
/// clients target the controller URL with the session's credentials and come
/// from the shared [`EngineRegistry`].
#[derive(Debug, Clone)]
pub struct DceClient {
    api: Arc<DceApiClient>,
    registry: Arc<EngineRegistry>,
}

impl DceClient {
    /// Combine a session with the registry engine clients are taken from.
    #[must_use]
    pub const fn from_parts(api: Arc<DceApiClient>, registry: Arc<EngineRegistry>) -> Self {
        Self { api, registry }
    }

    /// The controller session.
    #[must_use]
    pub const fn api(&self) -> &Arc<DceApiClient> {
        &self.api
    }

    /// The engine-client registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    fn engine_params(&self) -> EngineClientParams {
        EngineClientParams::new(self.api.base_url()).with_credentials(self.api.credentials().clone())
    }

    /// Raw engine client for the controller's engine endpoint.
    ///
    /// # Errors
    ///
    /// See [`EngineRegistry::engine_client`].
    pub fn docker_api_client(&self) -> Result<Arc<DockerApiClient>> {
        self.registry.engine_client(&self.engine_params())
    }

    /// Typed engine client for the controller's engine endpoint.
    ///
    /// # Errors
    ///
    /// See [`EngineRegistry::engine_client`].
    pub fn docker_client(&self) -> Result<DockerClient> {
        self.registry.docker_client(&self.engine_params())
    }
}

impl Deref for DceClient {
    type Target = DceApiClient;

    fn deref(&self) -> &Self::Target {
        &self.api
    }
}

impl fmt::Display for DceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.api, f)
    }
}
