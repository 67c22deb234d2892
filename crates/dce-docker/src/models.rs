//! Engine domain models.

use crate::Result;
use dce_core::types::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Stack a service was deployed with.
pub const STACK_NAMESPACE_LABEL: &str = "com.docker.stack.namespace";
/// Tenant owning a service.
pub const TENANT_LABEL: &str = "io.daocloud.dce.authz.tenant";
/// User owning a service.
pub const OWNER_LABEL: &str = "io.daocloud.dce.authz.owner";
/// Marks platform services.
pub const SYSTEM_LABEL: &str = "io.daocloud.dce.system";

/// Object version used for optimistic concurrency on updates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectVersion {
    /// Version index
    #[serde(default)]
    pub index: u64,
}

/// Container part of a task template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSpec {
    /// Image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Container labels
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    /// `KEY=VALUE` environment entries
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub env: Vec<String>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Task template of a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TaskTemplate {
    /// Container definition
    #[serde(default)]
    pub container_spec: ContainerSpec,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// User-controlled part of a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSpec {
    /// Service name
    #[serde(default)]
    pub name: String,
    /// Service labels
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    /// Task template
    #[serde(default)]
    pub task_template: TaskTemplate,
    /// Published ports and resolution mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_spec: Option<Value>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A published port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PortConfig {
    /// Port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `tcp`, `udp` or `sctp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Port inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    /// Port on the routing mesh or host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_port: Option<u16>,
    /// `ingress` or `host`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_mode: Option<String>,
}

/// Observed endpoint of a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEndpoint {
    /// Endpoint spec in effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    /// Published ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortConfig>,
    /// Virtual IPs per network
    #[serde(default, rename = "VirtualIPs", skip_serializing_if = "Vec::is_empty")]
    pub virtual_ips: Vec<Value>,
}

/// A swarm service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    /// Service identifier
    #[serde(rename = "ID")]
    pub id: String,
    /// Current object version
    #[serde(default)]
    pub version: ObjectVersion,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Service spec
    #[serde(default)]
    pub spec: ServiceSpec,
    /// Observed endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ServiceEndpoint>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    /// Decode a service from its inspect document.
    ///
    /// # Errors
    ///
    /// Returns [`dce_core::Error::ParseError`] when the document is not a service.
    pub fn from_attrs(attrs: Value) -> Result<Self> {
        Ok(serde_json::from_value(attrs)?)
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Labels applied to the service's containers.
    #[must_use]
    pub fn container_labels(&self) -> &BTreeMap<String, String> {
        &self.spec.task_template.container_spec.labels
    }

    /// Labels applied to the service itself.
    #[must_use]
    pub fn service_labels(&self) -> &BTreeMap<String, String> {
        &self.spec.labels
    }

    /// Stack (application) the service belongs to.
    #[must_use]
    pub fn app_name(&self) -> Option<&str> {
        self.label(STACK_NAMESPACE_LABEL)
    }

    /// Owning tenant.
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.label(TENANT_LABEL)
    }

    /// Owning user.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.label(OWNER_LABEL)
    }

    /// Requested endpoint spec.
    #[must_use]
    pub fn endpoint_spec(&self) -> Option<&Value> {
        self.spec.endpoint_spec.as_ref()
    }

    /// Whether the service is part of the platform itself.
    ///
    /// Empty, `false` and `0` label values do not count.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.label(SYSTEM_LABEL)
            .is_some_and(|value| !matches!(value.trim(), "" | "0" | "false" | "False"))
    }

    /// Observed endpoint.
    #[must_use]
    pub fn endpoint(&self) -> Option<&ServiceEndpoint> {
        self.endpoint.as_ref()
    }

    /// Published ports of the observed endpoint.
    #[must_use]
    pub fn endpoint_ports(&self) -> &[PortConfig] {
        self.endpoint
            .as_ref()
            .map(|endpoint| endpoint.ports.as_slice())
            .unwrap_or_default()
    }

    /// Container environment as a map.
    ///
    /// Entries are split at the first `=`; entries without one are ignored and
    /// later duplicates win.
    #[must_use]
    pub fn container_env(&self) -> BTreeMap<&str, &str> {
        self.spec
            .task_template
            .container_spec
            .env
            .iter()
            .filter_map(|entry| entry.split_once('='))
            .collect()
    }

    fn label(&self, name: &str) -> Option<&str> {
        self.spec.labels.get(name).map(String::as_str)
    }
}

/// Swarm membership of the engine's node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwarmInfo {
    /// Node identifier
    #[serde(rename = "NodeID", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Address the node uses for cluster traffic
    #[serde(rename = "NodeAddr", default, skip_serializing_if = "Option::is_none")]
    pub node_addr: Option<String>,
    /// `active`, `inactive`, `pending`, ...
    #[serde(rename = "LocalNodeState", default, skip_serializing_if = "Option::is_none")]
    pub local_node_state: Option<String>,
    /// Whether this node is a manager
    #[serde(rename = "ControlAvailable", default)]
    pub control_available: bool,
}

/// Payload of `/info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
    /// Host name of the engine's node
    #[serde(default)]
    pub name: String,
    /// Engine release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    /// Swarm membership
    #[serde(default)]
    pub swarm: SwarmInfo,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `/version`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EngineVersion {
    /// Engine release
    #[serde(default)]
    pub version: String,
    /// Highest supported API version
    #[serde(default)]
    pub api_version: String,
    /// Lowest supported API version
    #[serde(rename = "MinAPIVersion", default, skip_serializing_if = "Option::is_none")]
    pub min_api_version: Option<String>,
    /// Operating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// CPU architecture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `/services/create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceCreated {
    /// New service identifier
    #[serde(rename = "ID")]
    pub id: String,
    /// Warnings raised while creating
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dce_base() -> Value {
        json!({
            "ID": "svc1",
            "Version": {"Index": 42},
            "Spec": {
                "Name": "dce_base",
                "Labels": {
                    "com.docker.stack.namespace": "dce",
                    "io.daocloud.dce.authz.tenant": "ops",
                    "io.daocloud.dce.authz.owner": "admin",
                    "io.daocloud.dce.system": "true"
                },
                "TaskTemplate": {
                    "ContainerSpec": {
                        "Image": "daocloud.io/dce-base:2.7.14",
                        "Labels": {"tier": "control"},
                        "Env": ["SWARM_PORT=1234", "CONTROLLER_PORT=5678", "NOVALUE", "OPTS=a=b"]
                    },
                    "RestartPolicy": {"Condition": "any"}
                },
                "EndpointSpec": {"Mode": "vip"}
            },
            "Endpoint": {
                "Ports": [{"Protocol": "tcp", "TargetPort": 80, "PublishedPort": 8080}]
            }
        })
    }

    #[test]
    fn test_service_accessors() {
        let service = Service::from_attrs(dce_base()).unwrap();

        assert_eq!(service.name(), "dce_base");
        assert_eq!(service.version.index, 42);
        assert_eq!(service.app_name(), Some("dce"));
        assert_eq!(service.tenant(), Some("ops"));
        assert_eq!(service.owner(), Some("admin"));
        assert!(service.is_system());
        assert_eq!(service.container_labels().get("tier").map(String::as_str), Some("control"));
        assert_eq!(service.endpoint_spec(), Some(&json!({"Mode": "vip"})));
        assert_eq!(service.endpoint_ports()[0].published_port, Some(8080));
        assert!(service.spec.task_template.extra.contains_key("RestartPolicy"));
    }

    #[test]
    fn test_container_env_split_at_first_equals() {
        let service = Service::from_attrs(dce_base()).unwrap();
        let env = service.container_env();

        assert_eq!(env.get("SWARM_PORT"), Some(&"1234"));
        assert_eq!(env.get("OPTS"), Some(&"a=b"));
        assert!(!env.contains_key("NOVALUE"));
    }

    #[test]
    fn test_minimal_service_defaults() {
        let service = Service::from_attrs(json!({"ID": "bare"})).unwrap();

        assert_eq!(service.name(), "");
        assert!(service.service_labels().is_empty());
        assert!(service.endpoint().is_none());
        assert!(service.endpoint_ports().is_empty());
        assert!(!service.is_system());
        assert!(service.app_name().is_none());
    }

    #[test]
    fn test_null_labels_and_env_decode_as_empty() {
        let service = Service::from_attrs(json!({
            "ID": "s",
            "Spec": {
                "Name": "web",
                "Labels": null,
                "TaskTemplate": {"ContainerSpec": {"Image": "nginx", "Labels": null, "Env": null}}
            }
        }))
        .unwrap();

        assert_eq!(service.name(), "web");
        assert!(service.service_labels().is_empty());
        assert!(service.container_labels().is_empty());
        assert!(service.container_env().is_empty());
        assert!(service.tenant().is_none());
    }

    #[test]
    fn test_system_flag_values() {
        let mut service = Service::from_attrs(json!({"ID": "s"})).unwrap();
        service.spec.labels.insert(SYSTEM_LABEL.to_string(), "false".to_string());
        assert!(!service.is_system());
        service.spec.labels.insert(SYSTEM_LABEL.to_string(), "1".to_string());
        assert!(service.is_system());
    }

    #[test]
    fn test_invalid_attrs() {
        assert!(matches!(
            Service::from_attrs(json!(["not", "a", "service"])),
            Err(dce_core::Error::ParseError(_))
        ));
    }

    #[test]
    fn test_system_info() {
        let info: SystemInfo = serde_json::from_value(json!({
            "Name": "node-1",
            "ServerVersion": "17.06.2-ce",
            "Swarm": {"NodeID": "abc", "NodeAddr": "10.0.0.1", "LocalNodeState": "active", "ControlAvailable": true},
            "Containers": 12
        }))
        .unwrap();

        assert_eq!(info.name, "node-1");
        assert_eq!(info.swarm.node_addr.as_deref(), Some("10.0.0.1"));
        assert!(info.swarm.control_available);
        assert_eq!(info.extra["Containers"], 12);
    }

    #[test]
    fn test_service_created_null_warnings() {
        let created: ServiceCreated =
            serde_json::from_value(json!({"ID": "new", "Warnings": null})).unwrap();
        assert_eq!(created.id, "new");
        assert!(created.warnings.is_empty());
    }
}
