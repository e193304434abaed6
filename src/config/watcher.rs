//! Configuration file watcher for hot reload.
//!
//! Only the sections read per use (node, balancer, contexts, engines) take
//! effect on reload; cluster membership and the bind address need a restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use crate::config::loader::load_config;
use crate::config::schema::CoordinatorConfig;

type ReloadHook = Arc<dyn Fn(&CoordinatorConfig) + Send + Sync>;

/// Watches the configuration file and swaps in every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Arc<ArcSwap<CoordinatorConfig>>,
    hook: Option<ReloadHook>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, current: Arc<ArcSwap<CoordinatorConfig>>) -> Self {
        Self {
            path: path.to_path_buf(),
            current,
            hook: None,
        }
    }

    /// Run `hook` with every configuration that is swapped in.
    pub fn on_reload(mut self, hook: impl Fn(&CoordinatorConfig) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let current = self.current.clone();
        let hook = self.hook.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    if reload(&path, &current) {
                        if let Some(hook) = &hook {
                            hook(&current.load());
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, current: &ArcSwap<CoordinatorConfig>) -> bool {
    match load_config(path) {
        Ok(new_config) => {
            let old = current.load();
            if old.cluster.peers != new_config.cluster.peers
                || old.node.bind_address != new_config.node.bind_address
            {
                tracing::warn!("Cluster peers or bind address changed; restart required for those to apply");
            }
            tracing::info!(
                engines = new_config.engines.len(),
                auto_enable = new_config.contexts.auto_enable,
                "Configuration reloaded"
            );
            current.store(Arc::new(new_config));
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            false
        }
    }
}
