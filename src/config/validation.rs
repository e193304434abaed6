//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check peer URLs and proxy addresses are usable
//! - Validate value ranges (intervals > 0, capacity > 0)
//! - Detect duplicate engine routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoordinatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::CoordinatorConfig;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid peer URL '{url}': {reason}")]
    PeerUrl { url: String, reason: String },

    #[error("invalid proxy address '{0}', expected host:port")]
    ProxyAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("fixed_load {0} is outside 0-100")]
    Load(u8),

    #[error("duplicate engine route '{0}'")]
    DuplicateRoute(String),

    #[error("invalid excluded context '{0}', expected host:/path or /path")]
    ExcludedContext(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CoordinatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.node.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.node.bind_address.clone()));
    }

    if config.node.fixed_load > 100 {
        errors.push(ValidationError::Load(config.node.fixed_load));
    }

    for peer in &config.cluster.peers {
        match url::Url::parse(peer) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::PeerUrl {
                url: peer.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::PeerUrl {
                url: peer.clone(),
                reason: e.to_string(),
            }),
        }
    }

    for address in &config.proxies.addresses {
        if !is_host_port(address) {
            errors.push(ValidationError::ProxyAddress(address.clone()));
        }
    }

    if config.cluster.rpc_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "cluster.rpc_timeout_ms" });
    }
    if config.cluster.status_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "cluster.status_interval_secs" });
    }
    if config.cluster.journal_capacity == 0 {
        errors.push(ValidationError::Zero { field: "cluster.journal_capacity" });
    }

    let mut routes = HashSet::new();
    for engine in &config.engines {
        if !routes.insert(engine.route.as_str()) {
            errors.push(ValidationError::DuplicateRoute(engine.route.clone()));
        }
    }

    for excluded in &config.contexts.excluded {
        let path = excluded.rsplit_once(':').map(|(_, p)| p).unwrap_or(excluded);
        if !path.starts_with('/') {
            errors.push(ValidationError::ExcludedContext(excluded.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port.
pub(crate) fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
