//! Cluster node types shared by the DCE and engine APIs.
//!
//! Both the DCE controller (`/{prefix}/nodes`) and the engine (`/nodes`) report
//! swarm nodes in the engine's own document shape.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Deserialize a field the engine may send as `null`, falling back to the default.
///
/// # Errors
///
/// Fails only when the value is neither `null` nor a valid `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Role of a swarm node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Control-plane node
    Manager,
    /// Worker node
    #[default]
    Worker,
    /// Unrecognized role
    #[serde(other)]
    Other,
}

impl NodeRole {
    /// Returns the role as reported by the engine.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Worker => "worker",
            Self::Other => "other",
        }
    }
}

/// User-controlled part of a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NodeSpec {
    /// Swarm role
    #[serde(default)]
    pub role: NodeRole,
    /// Scheduling availability (`active`, `pause`, `drain`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    /// Node labels
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
}

/// Raft membership details, present on managers only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ManagerStatus {
    /// `host:port` the manager listens on for the cluster
    #[serde(default)]
    pub addr: Option<String>,
    /// Whether this manager is the raft leader
    #[serde(default)]
    pub leader: bool,
    /// Raft reachability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachability: Option<String>,
}

/// Observed node state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NodeStatus {
    /// `ready`, `down`, ...
    #[serde(default)]
    pub state: Option<String>,
    /// Address the node was last seen at
    #[serde(default)]
    pub addr: Option<String>,
}

/// A swarm node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    /// Node identifier
    #[serde(rename = "ID")]
    pub id: String,
    /// Node spec
    #[serde(default)]
    pub spec: NodeSpec,
    /// Present when the node is a manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_status: Option<ManagerStatus>,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    /// Engine and platform description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<serde_json::Value>,
}

impl Node {
    /// Returns true for manager nodes.
    #[must_use]
    pub fn is_manager(&self) -> bool {
        self.spec.role == NodeRole::Manager
    }

    /// Host part of the manager listen address.
    #[must_use]
    pub fn manager_host(&self) -> Option<&str> {
        let addr = self.manager_status.as_ref()?.addr.as_deref()?;
        Some(split_host(addr))
    }
}

/// Strip the port from a `host:port` address, unwrapping bracketed IPv6 hosts.
///
/// Unbracketed addresses with more than one colon are IPv6 hosts and are
/// returned whole.
#[must_use]
pub fn split_host(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match addr.split_once(':') {
        Some((host, port)) if !port.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => addr,
    }
}
