//! Cluster node identity and discovery events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::proxy::ProxyEndpoint;

/// Identity of a cluster member.
///
/// Generated identities carry a random suffix so that a restarted node (whose
/// discovery-event indices start again at 1) is never confused with its
/// previous incarnation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a fresh identity for this process incarnation of `name`.
    pub fn generate(name: &str) -> Self {
        Self(format!("{}-{}", name, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An intent to add or remove a proxy, pending application by the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    /// Node whose coordinator recorded the event.
    pub sender: NodeId,
    pub endpoint: ProxyEndpoint,
    /// `true` to add the proxy, `false` to remove it.
    pub addition: bool,
    /// Sequence number, starting at 1, per sender coordinator instance.
    pub event_index: u64,
}

impl DiscoveryEvent {
    /// Key used by the master to drop retransmitted events.
    pub fn key(&self) -> (&NodeId, u64) {
        (&self.sender, self.event_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_generated_ids_are_unique_per_incarnation() {
        let a = NodeId::generate("node1");
        let b = NodeId::generate("node1");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("node1-"));
    }

    #[test]
    fn test_node_id_usable_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(NodeId::new("n1"), 3u64);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"n1":3}"#);
    }
}
