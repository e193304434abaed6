//! Local proxy handler boundary.
//!
//! # Data Flow
//! ```text
//! coordinator (master branch) / inbound RPC on the master
//!     → ProxyHandler (owns proxy connections, encodes commands)
//!     → per-proxy ProxyState + responses
//! ```
//!
//! # Design Decisions
//! - The wire protocol, its connections and its retry policy live behind this
//!   trait; nothing else in the crate performs proxy I/O
//! - Errors are returned as-is and propagate unchanged through the coordinator
//! - `simulated.rs` provides a dry-run implementation with no wire I/O

pub mod simulated;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ProxyBatchResponses, ProxyCommand, ProxyEndpoint, ProxyResponses, ProxyState};

pub use simulated::SimulatedProxyHandler;

/// Errors raised by a local proxy handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler was shut down and has not been re-initialized.
    #[error("Proxy handler is shut down")]
    ShutDown,

    /// Communication with a proxy failed.
    #[error("Proxy {proxy} failed: {message}")]
    Proxy { proxy: String, message: String },

    /// A command could not be encoded.
    #[error("Invalid command {command}: {reason}")]
    InvalidCommand { command: String, reason: String },
}

/// Result type for handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Notified when a connection to a proxy is established.
pub trait ConnectionListener: Send + Sync {
    fn connection_established(&self, proxy: &str);

    fn is_established(&self) -> bool;
}

/// A listener that remembers whether any proxy connection was ever made.
#[derive(Debug, Default)]
pub struct EstablishedFlag {
    established: AtomicBool,
}

impl EstablishedFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ConnectionListener for EstablishedFlag {
    fn connection_established(&self, proxy: &str) {
        if !self.established.swap(true, Ordering::Relaxed) {
            tracing::info!(proxy = %proxy, "First proxy connection established");
        }
    }

    fn is_established(&self) -> bool {
        self.established.load(Ordering::Relaxed)
    }
}

/// Owns wire connections to the configured proxies.
#[async_trait]
pub trait ProxyHandler: Send + Sync {
    /// (Re)initialize with the given proxies.
    async fn init(
        &self,
        endpoints: Vec<ProxyEndpoint>,
        listener: Arc<dyn ConnectionListener>,
    ) -> HandlerResult<()>;

    async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()>;

    async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()>;

    /// Snapshot of every known proxy, sorted by address.
    fn get_proxy_states(&self) -> Vec<ProxyState>;

    fn is_proxy_health_ok(&self) -> bool;

    async fn mark_proxies_in_error(&self) -> HandlerResult<()>;

    /// Move DOWN proxies back to ERROR so the next status refresh resyncs them.
    async fn reset(&self) -> HandlerResult<()>;

    /// Periodic refresh: resynchronize proxies in error.
    async fn status(&self) -> HandlerResult<()>;

    async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses>;

    async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses>;

    /// Close every proxy connection held by this node.
    async fn shutdown(&self) -> HandlerResult<()>;
}
