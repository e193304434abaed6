//! Cluster RPC messages and fan-out aggregation.
//!
//! Every operation a node can invoke on its peers is one variant of
//! [`ClusterRequest`]; each has a typed call struct implementing [`RpcCall`]
//! that fixes its reply type, so callers never match on responses by hand.

use std::collections::BTreeMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{
    DiscoveryEvent, NodeId, PeerContextMap, ProxyBatchResponses, ProxyCommand, ProxyResponses,
    ProxyState,
};
use crate::observability::metrics;

/// An operation invoked on every other cluster member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum ClusterRequest {
    DiscoveryEvents(Vec<DiscoveryEvent>),
    IsProxyHealthOk,
    MarkProxiesInError,
    Reset,
    SendRequest(ProxyCommand),
    SendRequests(Vec<ProxyCommand>),
    GetResetRequests(PeerContextMap),
    GetClusterCoordinatorState(Vec<ProxyState>),
    ClusterStatusComplete(ClusterStatusComplete),
    StopOldMaster,
}

impl ClusterRequest {
    /// Operation name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ClusterRequest::DiscoveryEvents(_) => "discovery_events",
            ClusterRequest::IsProxyHealthOk => "is_proxy_health_ok",
            ClusterRequest::MarkProxiesInError => "mark_proxies_in_error",
            ClusterRequest::Reset => "reset",
            ClusterRequest::SendRequest(_) => "send_request",
            ClusterRequest::SendRequests(_) => "send_requests",
            ClusterRequest::GetResetRequests(_) => "get_reset_requests",
            ClusterRequest::GetClusterCoordinatorState(_) => "get_cluster_coordinator_state",
            ClusterRequest::ClusterStatusComplete(_) => "cluster_status_complete",
            ClusterRequest::StopOldMaster => "stop_old_master",
        }
    }
}

/// A member's answer to a [`ClusterRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ClusterResponse {
    Ack,
    Health(bool),
    Responses(ProxyResponses),
    BatchResponses(ProxyBatchResponses),
    Requests(Vec<ProxyCommand>),
    CoordinatorState(PeerCoordinatorState),
}

impl ClusterResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterResponse::Ack => "ack",
            ClusterResponse::Health(_) => "health",
            ClusterResponse::Responses(_) => "responses",
            ClusterResponse::BatchResponses(_) => "batch_responses",
            ClusterResponse::Requests(_) => "requests",
            ClusterResponse::CoordinatorState(_) => "coordinator_state",
        }
    }
}

/// What a non-master reports to the master on each status cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerCoordinatorState {
    pub node: NodeId,
    /// Discovery events not yet acknowledged by a master.
    pub pending_events: Vec<DiscoveryEvent>,
    /// Commands the peer needs sent to the proxies (its STATUS requests).
    pub requests: Vec<ProxyCommand>,
    /// The peer's replicated view of proxy health.
    pub proxies: Vec<ProxyState>,
}

/// Published by the master at the end of a status cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatusComplete {
    /// The master's proxy states after the cycle.
    pub proxies: Vec<ProxyState>,
    /// Highest discovery-event index applied, per sender.
    pub acknowledged: BTreeMap<NodeId, u64>,
}

/// Cluster-wide invocation facility.
#[async_trait]
pub trait ClusterRpc: Send + Sync {
    /// Invoke on every other member and wait for all of them (or their
    /// timeout). One entry per member; `None` when it could not answer.
    async fn call_all(&self, request: ClusterRequest) -> Vec<Option<ClusterResponse>>;

    /// Deliver to every other member without waiting for replies.
    fn notify_all(&self, request: ClusterRequest);
}

/// One member's answer to a fan-out call. Absence is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutReply<T> {
    pub result: Option<T>,
}

impl<T> FanoutReply<T> {
    pub fn is_present(&self) -> bool {
        self.result.is_some()
    }
}

/// A typed request/response pair.
pub trait RpcCall {
    type Reply;

    fn into_request(self) -> ClusterRequest;

    /// Extract the typed reply; `None` if the response does not belong to this call.
    fn reply(response: ClusterResponse) -> Option<Self::Reply>;
}

/// Broadcast a batch of discovery events.
pub struct DiscoveryEventCall(pub Vec<DiscoveryEvent>);

impl RpcCall for DiscoveryEventCall {
    type Reply = ();

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::DiscoveryEvents(self.0)
    }

    fn reply(response: ClusterResponse) -> Option<()> {
        matches!(response, ClusterResponse::Ack).then_some(())
    }
}

pub struct IsProxyHealthOkCall;

impl RpcCall for IsProxyHealthOkCall {
    type Reply = bool;

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::IsProxyHealthOk
    }

    fn reply(response: ClusterResponse) -> Option<bool> {
        match response {
            ClusterResponse::Health(ok) => Some(ok),
            _ => None,
        }
    }
}

pub struct MarkProxiesInErrorCall;

impl RpcCall for MarkProxiesInErrorCall {
    type Reply = ();

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::MarkProxiesInError
    }

    fn reply(response: ClusterResponse) -> Option<()> {
        matches!(response, ClusterResponse::Ack).then_some(())
    }
}

pub struct ResetCall;

impl RpcCall for ResetCall {
    type Reply = ();

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::Reset
    }

    fn reply(response: ClusterResponse) -> Option<()> {
        matches!(response, ClusterResponse::Ack).then_some(())
    }
}

pub struct SendRequestCall(pub ProxyCommand);

impl RpcCall for SendRequestCall {
    type Reply = ProxyResponses;

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::SendRequest(self.0)
    }

    fn reply(response: ClusterResponse) -> Option<ProxyResponses> {
        match response {
            ClusterResponse::Responses(responses) => Some(responses),
            _ => None,
        }
    }
}

pub struct SendRequestsCall(pub Vec<ProxyCommand>);

impl RpcCall for SendRequestsCall {
    type Reply = ProxyBatchResponses;

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::SendRequests(self.0)
    }

    fn reply(response: ClusterResponse) -> Option<ProxyBatchResponses> {
        match response {
            ClusterResponse::BatchResponses(responses) => Some(responses),
            _ => None,
        }
    }
}

pub struct GetResetRequestsCall(pub PeerContextMap);

impl RpcCall for GetResetRequestsCall {
    type Reply = Vec<ProxyCommand>;

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::GetResetRequests(self.0)
    }

    fn reply(response: ClusterResponse) -> Option<Vec<ProxyCommand>> {
        match response {
            ClusterResponse::Requests(requests) => Some(requests),
            _ => None,
        }
    }
}

pub struct GetClusterCoordinatorStateCall(pub Vec<ProxyState>);

impl RpcCall for GetClusterCoordinatorStateCall {
    type Reply = PeerCoordinatorState;

    fn into_request(self) -> ClusterRequest {
        ClusterRequest::GetClusterCoordinatorState(self.0)
    }

    fn reply(response: ClusterResponse) -> Option<PeerCoordinatorState> {
        match response {
            ClusterResponse::CoordinatorState(state) => Some(state),
            _ => None,
        }
    }
}

/// Invoke `call` on every other member and decode the replies.
///
/// Unreachable members and replies of the wrong kind both become absent.
pub async fn fan_out<C: RpcCall>(rpc: &dyn ClusterRpc, call: C) -> Vec<FanoutReply<C::Reply>> {
    let request = call.into_request();
    let op = request.name();
    let responses = rpc.call_all(request).await;

    let replies: Vec<FanoutReply<C::Reply>> = responses
        .into_iter()
        .map(|response| FanoutReply {
            result: response.and_then(|r| {
                let kind = r.kind();
                let decoded = C::reply(r);
                if decoded.is_none() {
                    tracing::warn!(op, kind, "Unexpected reply kind, treating as absent");
                }
                decoded
            }),
        })
        .collect();

    let absent = replies.iter().filter(|r| !r.is_present()).count();
    tracing::debug!(op, members = replies.len(), absent, "Cluster fan-out complete");
    metrics::record_fanout(op, replies.len(), absent);
    replies
}

/// Fire-and-forget notification to every other member.
pub fn notify(rpc: &dyn ClusterRpc, request: ClusterRequest) {
    tracing::debug!(op = request.name(), "Cluster notification");
    metrics::record_notification(request.name());
    rpc.notify_all(request);
}

/// The first present result, in reply order.
pub fn first_present<T>(replies: Vec<FanoutReply<T>>) -> Option<T> {
    replies.into_iter().find_map(|r| r.result)
}

/// Every present list, concatenated in reply order.
pub fn flatten_present<T>(replies: Vec<FanoutReply<Vec<T>>>) -> Vec<T> {
    replies.into_iter().filter_map(|r| r.result).flatten().collect()
}
