//! Virtual hosts as seen by a proxy.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};

/// Logical host grouping contexts under one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub name: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// Context paths the proxy currently holds for this host.
    #[serde(default)]
    pub contexts: BTreeSet<String>,
}

impl VirtualHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: BTreeSet::new(),
            contexts: BTreeSet::new(),
        }
    }

    /// True if `alias` names this host, either directly or as an alias.
    pub fn answers_to(&self, alias: &str) -> bool {
        self.name == alias || self.aliases.contains(alias)
    }
}

/// A proxy's current view of the cluster: route → virtual hosts.
///
/// Passed unchanged to every peer while assembling reset requests.
pub type PeerContextMap = BTreeMap<String, Vec<VirtualHost>>;
