//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoordinatorConfig (validated, immutable)
//!     → shared via Arc<ArcSwap<_>> to the container, request factory and service
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<CoordinatorConfig>
//!     → next CONFIG / reset request observes new values
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::CoordinatorConfig;
pub use schema::{
    AdminConfig, BalancerConfig, ClusterConfig, ContextConfig, ContextsConfig, EngineConfig,
    HostConfig, NodeConfig, ObservabilityConfig, ProxyListConfig,
};
