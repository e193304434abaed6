//! Shared domain types.
//!
//! # Data Flow
//! ```text
//! config / admin / peers
//!     → ProxyEndpoint (proxy known, not yet confirmed)
//!     → local handler tracks it as ProxyState (OK / ERROR / DOWN)
//!
//! non-master mutation
//!     → DiscoveryEvent (sender + per-instance index)
//!     → journal + cluster broadcast → applied by the master
//!
//! container topology + request factory
//!     → ProxyCommand (CONFIG, ENABLE-APP, ...)
//!     → local handler (master) or master via RPC
//! ```
//!
//! # Design Decisions
//! - Every type here crosses the cluster wire, so all of them are serde types
//! - Proxy addresses stay `host:port` strings; proxies may be named by hostname

pub mod command;
pub mod event;
pub mod host;
pub mod proxy;

pub use command::{CommandType, ProxyBatchResponses, ProxyCommand, ProxyResponses};
pub use event::{DiscoveryEvent, NodeId};
pub use host::{PeerContextMap, VirtualHost};
pub use proxy::{ProxyEndpoint, ProxyState, ProxyStatus};
