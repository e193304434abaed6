//! Cluster RPC subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator / reset builder / status cycle
//!     → typed call (rpc.rs: SendRequestCall, GetResetRequestsCall, ...)
//!     → ClusterRpc::call_all (http.rs: POST /cluster/rpc to every peer)
//!     → Vec<FanoutReply<T>> (absent = unreachable or not answering)
//!     → first_present / flatten_present
//!
//! peer → POST /cluster/rpc
//!     → ProxyService::handle_rpc (service/dispatch.rs)
//!     → Option<ClusterResponse> (null = absent)
//! ```
//!
//! # Design Decisions
//! - A closed set of request/response pairs instead of invocation by name
//! - Absence is data, not an error: aggregation absorbs it without retries
//! - Notifications (status complete, stop old master) never wait for replies

pub mod http;
pub mod rpc;

pub use http::{HttpClusterRpc, TransportError, RPC_PATH};
pub use rpc::{
    fan_out, first_present, flatten_present, notify, ClusterRequest, ClusterResponse, ClusterRpc,
    ClusterStatusComplete, FanoutReply, PeerCoordinatorState, RpcCall,
};
