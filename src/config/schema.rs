//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a
//! coordinator node. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a coordinator node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// This node's identity and worker parameters (sent in CONFIG).
    pub node: NodeConfig,

    /// Balancer parameters (sent in CONFIG).
    pub balancer: BalancerConfig,

    /// Cluster membership, election and status cycle.
    pub cluster: ClusterConfig,

    /// Proxies this node knows about at startup.
    pub proxies: ProxyListConfig,

    /// Context exclusion and auto-enable policy.
    pub contexts: ContextsConfig,

    /// Local container topology.
    pub engines: Vec<EngineConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name; the runtime identity adds a per-process suffix.
    pub name: String,

    /// Bind address for the cluster RPC endpoint and admin API.
    pub bind_address: String,

    /// Connector protocol advertised to proxies (ajp, http, https).
    pub connector_type: String,

    /// Load-balancing domain.
    pub domain: Option<String>,

    pub flush_packets: bool,

    pub flush_wait_ms: Option<u64>,

    /// Proxy → node ping timeout in seconds.
    pub ping_secs: u64,

    /// Soft maximum of idle connections kept by the proxy.
    pub smax: Option<u32>,

    /// Idle connection time to live in seconds.
    pub ttl_secs: u64,

    /// Proxy → node request timeout in seconds.
    pub node_timeout_secs: Option<u64>,

    /// Load value reported in STATUS requests (0-100).
    pub fixed_load: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node".to_string(),
            bind_address: "0.0.0.0:8090".to_string(),
            connector_type: "ajp".to_string(),
            domain: None,
            flush_packets: false,
            flush_wait_ms: None,
            ping_secs: 10,
            smax: None,
            ttl_secs: 60,
            node_timeout_secs: None,
            fixed_load: 100,
        }
    }
}

/// Balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    pub name: String,
    pub sticky_session: bool,
    pub sticky_session_cookie: String,
    pub sticky_session_path: String,
    pub sticky_session_remove: bool,
    pub sticky_session_force: bool,
    /// Seconds to wait for a worker before failing the request (0 = none).
    pub worker_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            name: "mycluster".to_string(),
            sticky_session: true,
            sticky_session_cookie: "JSESSIONID".to_string(),
            sticky_session_path: "jsessionid".to_string(),
            sticky_session_remove: false,
            sticky_session_force: true,
            worker_timeout_secs: 0,
            max_attempts: 1,
        }
    }
}

/// Cluster configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Base URLs of the other cluster members (e.g. "http://10.0.0.2:8090").
    pub peers: Vec<String>,

    /// Initial mastership of this node.
    pub master: bool,

    /// Per-member timeout for cluster RPC calls in milliseconds.
    pub rpc_timeout_ms: u64,

    /// Status cycle interval in seconds.
    pub status_interval_secs: u64,

    /// Maximum pending discovery events kept by this node.
    pub journal_capacity: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            master: false,
            rpc_timeout_ms: 5000,
            status_interval_secs: 10,
            journal_capacity: 1024,
        }
    }
}

/// Statically configured proxies.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyListConfig {
    /// Proxy addresses (`host:port`).
    pub addresses: Vec<String>,
}

/// Context filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextsConfig {
    /// Excluded contexts, as `host:/path` or `/path` (default host).
    pub excluded: Vec<String>,

    /// Enable contexts on the proxy as soon as they are started.
    pub auto_enable: bool,
}

impl Default for ContextsConfig {
    fn default() -> Self {
        Self {
            excluded: Vec::new(),
            auto_enable: true,
        }
    }
}

/// A container engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub name: String,

    /// Sticky-session route (jvmRoute) of this engine.
    pub route: String,

    /// Connector address proxies use to reach this engine.
    pub connector_address: String,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

/// A virtual host of an engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    pub name: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

/// A deployed web application context.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    pub path: String,

    #[serde(default = "default_started")]
    pub started: bool,
}

fn default_started() -> bool {
    true
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
