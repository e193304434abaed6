//! Local container topology.
//!
//! # Data Flow
//! ```text
//! [[engines]] config / reload / admin start-stop
//!     → StaticContainer (Engine → Host → Context, hot-swapped)
//!     → ContainerTopology::engines() snapshot
//!     → reset-request builder and admin operations walk it
//! ```
//!
//! # Design Decisions
//! - Read-only snapshots: callers never hold a lock while walking the tree
//! - "No container registered" (None) is distinct from "no engines"

use std::collections::BTreeSet;
use std::sync::Arc;
use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::config::EngineConfig;

/// A deployed web application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    pub path: String,
    pub started: bool,
    /// Started and accepting requests.
    pub available: bool,
}

/// A virtual host of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub name: String,
    pub aliases: BTreeSet<String>,
    pub contexts: Vec<Context>,
}

impl Host {
    /// The host name together with its aliases.
    pub fn alias_set(&self) -> BTreeSet<String> {
        let mut aliases = self.aliases.clone();
        aliases.insert(self.name.clone());
        aliases
    }

    pub fn context(&self, path: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.path == path)
    }
}

/// A container engine, identified on proxies by its route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Engine {
    pub name: String,
    pub route: String,
    /// Address proxies use to reach this engine's connector.
    pub connector_address: String,
    pub hosts: Vec<Host>,
}

impl From<&EngineConfig> for Engine {
    fn from(config: &EngineConfig) -> Self {
        Self {
            name: config.name.clone(),
            route: config.route.clone(),
            connector_address: config.connector_address.clone(),
            hosts: config
                .hosts
                .iter()
                .map(|h| Host {
                    name: h.name.clone(),
                    aliases: h.aliases.iter().cloned().collect(),
                    contexts: h
                        .contexts
                        .iter()
                        .map(|c| Context {
                            path: c.path.clone(),
                            started: c.started,
                            available: c.started,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Read-only view of the local container.
pub trait ContainerTopology: Send + Sync {
    /// Engines in their natural order, or `None` if no container is registered.
    fn engines(&self) -> Option<Vec<Engine>>;
}

/// Container topology built from configuration.
#[derive(Debug, Default)]
pub struct StaticContainer {
    engines: ArcSwapOption<Vec<Engine>>,
}

impl StaticContainer {
    /// A container with nothing registered.
    pub fn unregistered() -> Self {
        Self::default()
    }

    /// Register the configured engines; an empty list leaves the container unregistered.
    pub fn from_config(engines: &[EngineConfig]) -> Self {
        let container = Self::default();
        container.register(engines);
        container
    }

    /// Replace the registered topology (config reload).
    pub fn register(&self, engines: &[EngineConfig]) {
        if engines.is_empty() {
            self.engines.store(None);
        } else {
            let engines: Vec<Engine> = engines.iter().map(Engine::from).collect();
            self.engines.store(Some(Arc::new(engines)));
        }
    }

    /// Mark a context started or stopped. Returns false if it does not exist.
    pub fn set_started(&self, route: &str, host: &str, path: &str, started: bool) -> bool {
        let mut found = false;
        self.engines.rcu(|current| {
            found = false;
            let mut engines = current.as_deref().cloned().unwrap_or_default();
            for context in engines
                .iter_mut()
                .filter(|e| e.route == route)
                .flat_map(|e| e.hosts.iter_mut())
                .filter(|h| h.name == host)
                .flat_map(|h| h.contexts.iter_mut())
                .filter(|c| c.path == path)
            {
                context.started = started;
                context.available = started;
                found = true;
            }
            if engines.is_empty() {
                None
            } else {
                Some(Arc::new(engines))
            }
        });
        found
    }
}

impl ContainerTopology for StaticContainer {
    fn engines(&self) -> Option<Vec<Engine>> {
        self.engines.load_full().map(|engines| engines.as_ref().clone())
    }
}
