//! Cluster topology discovery through a container engine.
//!
//! The functions here are uncached single resolutions; [`DiscoveryContext`]
//! memoizes them and turns the results into shared clients.
//!
//! [`DiscoveryContext`]: crate::DiscoveryContext

use crate::Result;
use dce_api::DceApiClient;
use dce_core::config::Credentials;
use dce_core::types::Node;
use dce_core::Error;
use dce_docker::{EngineApi, EngineClientParams};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Platform service whose environment carries the cluster ports.
pub const DCE_BASE_SERVICE: &str = "dce_base";

/// Ports the DCE platform listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterPorts {
    /// Swarm manager port (`SWARM_PORT`)
    pub swarm: u16,
    /// Controller HTTP port (`CONTROLLER_PORT`)
    pub controller: u16,
    /// Controller HTTPS port (`CONTROLLER_SSL_PORT`)
    pub controller_ssl: u16,
}

/// Read the cluster ports from the `dce_base` service environment.
///
/// # Errors
///
/// Inspect failures are returned as-is; a missing or non-numeric port is
/// [`Error::DiscoveryFailed`].
pub async fn detect_cluster_ports(engine: &dyn EngineApi) -> Result<ClusterPorts> {
    let service = engine.inspect_service(DCE_BASE_SERVICE).await?;
    let env = container_env(&service);

    let port = |name: &str| -> Result<u16> {
        let raw = env.get(name).ok_or_else(|| {
            Error::DiscoveryFailed(format!("{DCE_BASE_SERVICE} does not define {name}"))
        })?;
        raw.trim().parse().map_err(|_| {
            Error::DiscoveryFailed(format!("{DCE_BASE_SERVICE} has a non-numeric {name}: `{raw}`"))
        })
    };

    let ports = ClusterPorts {
        swarm: port("SWARM_PORT")?,
        controller: port("CONTROLLER_PORT")?,
        controller_ssl: port("CONTROLLER_SSL_PORT")?,
    };
    debug!(?ports, engine = %engine.endpoint(), "cluster ports detected");
    Ok(ports)
}

fn container_env(service: &Value) -> BTreeMap<&str, &str> {
    service
        .pointer("/Spec/TaskTemplate/ContainerSpec/Env")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter_map(|entry| entry.split_once('='))
        .collect()
}

fn controller_url(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}

/// Connect to the controller running next to `engine`.
///
/// # Errors
///
/// [`Error::DiscoveryFailed`] when the engine is not in a swarm; otherwise
/// any error of [`detect_cluster_ports`] or of connecting the session.
pub async fn local_api_session(
    engine: &dyn EngineApi,
    credentials: &Credentials,
) -> Result<DceApiClient> {
    let system = engine.info().await?;
    let addr = system
        .swarm
        .node_addr
        .filter(|addr| !addr.is_empty())
        .ok_or_else(|| {
            Error::DiscoveryFailed(format!(
                "engine at {} does not report a swarm node address",
                engine.endpoint()
            ))
        })?;
    let ports = detect_cluster_ports(engine).await?;

    let url = controller_url(&addr, ports.controller);
    info!(%url, "connecting to local controller");
    DceApiClient::builder(url)
        .with_credentials(credentials.clone())
        .connect()
        .await
}

/// Resolve engine connection parameters for every cluster node.
///
/// The first manager's controller is asked for its IP map; each advertised
/// address becomes a node proxy URL on that controller, in IP map order. The
/// returned parameters carry `credentials` and `timeout`.
///
/// # Errors
///
/// [`Error::DiscoveryFailed`] when the engine reports no manager with an
/// address; otherwise any error of port detection, connecting the session or
/// fetching the IP map.
pub async fn node_engine_params(
    engine: &dyn EngineApi,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Vec<EngineClientParams>> {
    let nodes = engine.nodes().await?;
    let manager = nodes
        .iter()
        .filter(|node| node.is_manager())
        .find_map(Node::manager_host)
        .ok_or_else(|| {
            Error::DiscoveryFailed(format!(
                "engine at {} reports no manager node",
                engine.endpoint()
            ))
        })?;
    let ports = detect_cluster_ports(engine).await?;

    let session = DceApiClient::builder(controller_url(manager, ports.controller))
        .with_credentials(credentials.clone())
        .connect()
        .await?;
    let ip_map = session.ip_map().await?;

    let params: Vec<EngineClientParams> = ip_map
        .advertised_addresses()
        .into_iter()
        .map(|address| {
            EngineClientParams::new(session.node_docker_url(address))
                .with_credentials(credentials.clone())
                .with_timeout(timeout)
        })
        .collect();

    info!(controller = %session, nodes = params.len(), "node engines resolved");
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dce_core::ApiError;
    use dce_docker::SystemInfo;
    use reqwest::StatusCode;
    use serde_json::json;

    struct StubEngine {
        env: Value,
        nodes: Vec<Node>,
    }

    impl StubEngine {
        fn with_env(env: Value) -> Self {
            Self {
                env,
                nodes: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl EngineApi for StubEngine {
        fn endpoint(&self) -> String {
            "http://stub:2375".to_string()
        }

        async fn inspect_service(&self, service: &str) -> Result<Value> {
            if service != DCE_BASE_SERVICE {
                return Err(ApiError::classify(StatusCode::NOT_FOUND, "http://stub", b"").into());
            }
            Ok(json!({
                "ID": "base",
                "Spec": {"TaskTemplate": {"ContainerSpec": {"Env": self.env}}}
            }))
        }

        async fn nodes(&self) -> Result<Vec<Node>> {
            Ok(self.nodes.clone())
        }

        async fn info(&self) -> Result<SystemInfo> {
            Ok(SystemInfo::default())
        }
    }

    #[tokio::test]
    async fn test_detect_cluster_ports() {
        let engine = StubEngine::with_env(json!([
            "SWARM_PORT=1234",
            "CONTROLLER_PORT=5678",
            "CONTROLLER_SSL_PORT=5679",
            "BROKEN",
            "EXTRA=a=b"
        ]));

        let ports = detect_cluster_ports(&engine).await.unwrap();
        assert_eq!(
            ports,
            ClusterPorts {
                swarm: 1234,
                controller: 5678,
                controller_ssl: 5679
            }
        );
    }

    #[tokio::test]
    async fn test_missing_controller_port_fails() {
        let engine = StubEngine::with_env(json!(["SWARM_PORT=1234", "CONTROLLER_SSL_PORT=5679"]));
        let err = detect_cluster_ports(&engine).await.unwrap_err();
        assert_eq!(
            err,
            Error::DiscoveryFailed("dce_base does not define CONTROLLER_PORT".to_string())
        );
    }

    #[tokio::test]
    async fn test_non_numeric_port_fails() {
        let engine = StubEngine::with_env(json!([
            "SWARM_PORT=1234",
            "CONTROLLER_PORT=http",
            "CONTROLLER_SSL_PORT=5679"
        ]));
        assert!(matches!(
            detect_cluster_ports(&engine).await,
            Err(Error::DiscoveryFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_env_fails() {
        let engine = StubEngine::with_env(Value::Null);
        assert!(matches!(
            detect_cluster_ports(&engine).await,
            Err(Error::DiscoveryFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_no_swarm_address_fails() {
        let engine = StubEngine::with_env(json!([]));
        let err = local_api_session(&engine, &Credentials::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DISCOVERY_FAILED");
    }

    #[tokio::test]
    async fn test_no_managers_fails() {
        let mut engine = StubEngine::with_env(json!(["CONTROLLER_PORT=1"]));
        engine.nodes = vec![serde_json::from_value(json!({
            "ID": "w1",
            "Spec": {"Role": "worker"}
        }))
        .unwrap()];

        let err = node_engine_params(&engine, &Credentials::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DiscoveryFailed(_)));
    }

    #[test]
    fn test_controller_url() {
        assert_eq!(controller_url("10.0.0.1", 80), "http://10.0.0.1:80");
        assert_eq!(controller_url("fd00::1", 80), "http://[fd00::1]:80");
    }
}
