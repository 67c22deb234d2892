//! High-level engine client returning typed models.

use crate::client::DockerApiClient;
use crate::models::{Service, ServiceSpec, SystemInfo};
use crate::Result;
use dce_core::types::Node;
use std::sync::Arc;

/// Engine client that wraps a shared [`DockerApiClient`] and decodes models.
#[derive(Debug, Clone)]
pub struct DockerClient {
    api: Arc<DockerApiClient>,
}

impl DockerClient {
    /// Wrap a raw client.
    #[must_use]
    pub const fn new(api: Arc<DockerApiClient>) -> Self {
        Self { api }
    }

    /// The raw client.
    #[must_use]
    pub const fn api(&self) -> &Arc<DockerApiClient> {
        &self.api
    }

    /// Whether the engine answers its liveness check.
    pub async fn ping(&self) -> Result<bool> {
        Ok(self.api.ping().await?.trim() == "OK")
    }

    /// Engine system information.
    pub async fn info(&self) -> Result<SystemInfo> {
        self.api.info().await
    }

    /// Look up a service by id or name.
    pub async fn service(&self, service: &str) -> Result<Service> {
        Service::from_attrs(self.api.inspect_service(service).await?)
    }

    /// List every service.
    pub async fn services(&self) -> Result<Vec<Service>> {
        self.api
            .services()
            .await?
            .into_iter()
            .map(Service::from_attrs)
            .collect()
    }

    /// List swarm nodes.
    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.api.nodes().await
    }

    /// Create a service and return it as the engine reports it.
    pub async fn create_service(
        &self,
        spec: &ServiceSpec,
        registry_auth: Option<&str>,
    ) -> Result<Service> {
        let created = self
            .api
            .create_service_raw(&serde_json::to_value(spec)?, registry_auth)
            .await?;
        self.service(&created.id).await
    }

    /// Replace the spec of `service`, using its current object version.
    pub async fn update_service(&self, service: &Service, spec: &ServiceSpec) -> Result<()> {
        self.api
            .update_service_raw(&service.id, service.version.index, &serde_json::to_value(spec)?)
            .await?;
        Ok(())
    }
}

impl From<Arc<DockerApiClient>> for DockerClient {
    fn from(api: Arc<DockerApiClient>) -> Self {
        Self::new(api)
    }
}
