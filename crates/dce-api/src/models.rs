//! DCE controller payload models.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Payload of `/{prefix}/version`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VersionInfo {
    /// DCE release, e.g. `2.7.14`
    #[serde(rename = "DCEVersion", default, skip_serializing_if = "Option::is_none")]
    pub dce_version: Option<String>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `/{prefix}/info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterInfo {
    /// Cluster identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_uuid: Option<String>,
    /// Virtualization technology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virt_tech: Option<String>,
    /// Virtualization technology type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virt_tech_type: Option<String>,
    /// Event stream room
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_room: Option<String>,
    /// Cluster mode (`docker` or `kubernetes`), reported since 2.7.13
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Container network driver, reported since 2.7.13
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_driver: Option<String>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One node record of the controller IP map.
///
/// Controllers spell the address field either `advertised_address` or
/// `AdvertisedAddress` depending on the release.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpMapEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    advertised_address: Option<String>,
    #[serde(
        rename = "AdvertisedAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    legacy_advertised_address: Option<String>,
    /// Remaining fields, as reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IpMapEntry {
    /// Create an entry with the given advertised address.
    #[must_use]
    pub fn new(advertised_address: impl Into<String>) -> Self {
        Self {
            advertised_address: Some(advertised_address.into()),
            ..Self::default()
        }
    }

    /// The address the node publishes for inter-node traffic.
    #[must_use]
    pub fn advertised_address(&self) -> Option<&str> {
        self.advertised_address
            .as_deref()
            .or(self.legacy_advertised_address.as_deref())
    }
}

/// Node id to node address record, in the order the controller reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpMap {
    entries: Vec<(String, IpMapEntry)>,
}

impl IpMap {
    /// Decode the raw JSON object returned by `/{prefix}/ip_map`.
    ///
    /// # Errors
    ///
    /// Returns [`dce_core::Error::ParseError`] when a record is not an object.
    pub fn from_map(raw: Map<String, Value>) -> Result<Self> {
        let entries = raw
            .into_iter()
            .map(|(node, record)| Ok((node, serde_json::from_value(record)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the map has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record for a node id.
    #[must_use]
    pub fn get(&self, node: &str) -> Option<&IpMapEntry> {
        self.entries
            .iter()
            .find(|(id, _)| id == node)
            .map(|(_, entry)| entry)
    }

    /// Iterate over `(node id, record)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IpMapEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Advertised addresses in document order; records without one are skipped.
    #[must_use]
    pub fn advertised_addresses(&self) -> Vec<&str> {
        self.iter()
            .filter_map(|(node, entry)| {
                let address = entry.advertised_address();
                if address.is_none() {
                    debug!(node, "ip map record has no advertised address");
                }
                address
            })
            .collect()
    }
}

impl FromIterator<(String, IpMapEntry)> for IpMap {
    fn from_iter<I: IntoIterator<Item = (String, IpMapEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_version_info_keeps_extra_fields() {
        let info: VersionInfo = serde_json::from_value(json!({
            "DCEVersion": "2.7.14",
            "GitCommit": "abc123"
        }))
        .unwrap();

        assert_eq!(info.dce_version.as_deref(), Some("2.7.14"));
        assert_eq!(info.extra["GitCommit"], "abc123");
    }

    #[test]
    fn test_cluster_info_fields() {
        let info: ClusterInfo = serde_json::from_value(json!({
            "ClusterUuid": "c-1",
            "VirtTech": "kvm",
            "VirtTechType": "full",
            "StreamRoom": "room",
            "Mode": "docker",
            "NetworkDriver": "calico",
            "Nodes": 3
        }))
        .unwrap();

        assert_eq!(info.cluster_uuid.as_deref(), Some("c-1"));
        assert_eq!(info.mode.as_deref(), Some("docker"));
        assert_eq!(info.network_driver.as_deref(), Some("calico"));
        assert_eq!(info.extra["Nodes"], 3);
    }

    #[test]
    fn test_ip_map_accepts_both_address_spellings() {
        let map = IpMap::from_map(object(json!({
            "node-b": {"advertised_address": "10.0.0.2"},
            "node-a": {"AdvertisedAddress": "10.0.0.1"},
            "node-c": {"hostname": "c"}
        })))
        .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.advertised_addresses(), vec!["10.0.0.2", "10.0.0.1"]);
        assert_eq!(map.get("node-a").unwrap().advertised_address(), Some("10.0.0.1"));
        assert!(map.get("node-c").unwrap().advertised_address().is_none());
    }

    #[test]
    fn test_ip_map_rejects_non_object_records() {
        let result = IpMap::from_map(object(json!({"node": "10.0.0.1"})));
        assert!(matches!(result, Err(dce_core::Error::ParseError(_))));
    }

    #[test]
    fn test_ip_map_from_iter() {
        let map: IpMap = vec![
            ("n1".to_string(), IpMapEntry::new("10.0.0.1")),
            ("n2".to_string(), IpMapEntry::new("10.0.0.2")),
        ]
        .into_iter()
        .collect();

        let ids: Vec<&str> = map.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert!(!map.is_empty());
    }
}
