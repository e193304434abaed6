//! Context exclusion and enablement policy.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ContextsConfig;
use crate::container::Host;

/// Host used for exclusions written without one.
pub const DEFAULT_HOST: &str = "localhost";

/// Which contexts are never advertised to proxies, and whether started
/// contexts are advertised enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFilter {
    excluded: BTreeMap<String, BTreeSet<String>>,
    auto_enable: bool,
}

impl ContextFilter {
    pub fn new(auto_enable: bool) -> Self {
        Self {
            excluded: BTreeMap::new(),
            auto_enable,
        }
    }

    pub fn exclude(mut self, host: impl Into<String>, path: impl Into<String>) -> Self {
        self.excluded.entry(host.into()).or_default().insert(path.into());
        self
    }

    /// Parse `host:/path` and `/path` entries.
    pub fn from_config(config: &ContextsConfig) -> Self {
        config.excluded.iter().fold(Self::new(config.auto_enable), |filter, entry| {
            match entry.rsplit_once(':') {
                Some((host, path)) if !host.is_empty() => filter.exclude(host, path),
                _ => filter.exclude(DEFAULT_HOST, entry.trim_start_matches(':')),
            }
        })
    }

    /// Excluded for `host` under its name or any of its aliases.
    pub fn is_excluded(&self, host: &Host, path: &str) -> bool {
        std::iter::once(&host.name)
            .chain(host.aliases.iter())
            .filter_map(|name| self.excluded.get(name))
            .any(|paths| paths.contains(path))
    }

    pub fn auto_enable(&self) -> bool {
        self.auto_enable
    }
}
