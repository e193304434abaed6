//! HA-aware coordination of front-end reverse proxies across a cluster of
//! application-server nodes.
//!
//! Only the elected master node holds connections to the proxies; every
//! other node routes its proxy operations through the cluster.

// Domain model
pub mod model;

// Core coordination
pub mod cluster;
pub mod coordinator;
pub mod election;
pub mod reset;
pub mod service;

// Local collaborators
pub mod container;
pub mod handler;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::CoordinatorConfig;
pub use coordinator::ClusteredProxyCoordinator;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use reset::ResetRequestBuilder;
pub use service::ProxyService;
