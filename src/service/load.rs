//! Load metric reported to proxies in STATUS requests.

use std::sync::Arc;
use arc_swap::ArcSwap;

use crate::config::CoordinatorConfig;

/// Source of this node's load factor (0 = no capacity, 100 = fully available).
pub trait LoadProvider: Send + Sync {
    fn load(&self) -> u8;
}

/// Load taken from `node.fixed_load`, re-read on every call.
pub struct ConfiguredLoad {
    config: Arc<ArcSwap<CoordinatorConfig>>,
}

impl ConfiguredLoad {
    pub fn new(config: Arc<ArcSwap<CoordinatorConfig>>) -> Self {
        Self { config }
    }
}

impl LoadProvider for ConfiguredLoad {
    fn load(&self) -> u8 {
        self.config.load().node.fixed_load.min(100)
    }
}
