//! Inbound cluster RPC handling.
//!
//! Proxy-facing operations are answered only by the master; every other
//! node replies absent, so a caller's first present reply is the master's.

use crate::cluster::{ClusterRequest, ClusterResponse, ClusterStatusComplete, PeerCoordinatorState};
use crate::handler::HandlerResult;
use crate::model::{DiscoveryEvent, ProxyState};
use crate::reset::ResetRequestSource;
use crate::service::ProxyService;

impl ProxyService {
    /// Answer a request from a peer. `None` is an absent reply.
    pub async fn handle_rpc(&self, request: ClusterRequest) -> Option<ClusterResponse> {
        let op = request.name();
        tracing::trace!(op, node = %self.node_id, "Inbound cluster call");

        match request {
            ClusterRequest::DiscoveryEvents(events) => Some(self.on_discovery_events(events).await),
            ClusterRequest::IsProxyHealthOk => self
                .is_master()
                .then(|| ClusterResponse::Health(self.coordinator.handler().is_proxy_health_ok())),
            ClusterRequest::MarkProxiesInError => {
                if !self.is_master() {
                    return None;
                }
                answer(op, self.coordinator.handler().mark_proxies_in_error().await, |()| ClusterResponse::Ack)
            }
            ClusterRequest::Reset => {
                if !self.is_master() {
                    return None;
                }
                answer(op, self.coordinator.handler().reset().await, |()| ClusterResponse::Ack)
            }
            ClusterRequest::SendRequest(command) => {
                if !self.is_master() {
                    return None;
                }
                answer(op, self.coordinator.handler().send_request(command).await, ClusterResponse::Responses)
            }
            ClusterRequest::SendRequests(commands) => {
                if !self.is_master() {
                    return None;
                }
                answer(op, self.coordinator.handler().send_requests(commands).await, ClusterResponse::BatchResponses)
            }
            ClusterRequest::GetResetRequests(peer_contexts) => Some(ClusterResponse::Requests(
                self.reset_requests.get_local_reset_requests(&peer_contexts),
            )),
            ClusterRequest::GetClusterCoordinatorState(master_view) => {
                self.on_coordinator_state(master_view).map(ClusterResponse::CoordinatorState)
            }
            ClusterRequest::ClusterStatusComplete(complete) => {
                self.on_status_complete(complete);
                Some(ClusterResponse::Ack)
            }
            ClusterRequest::StopOldMaster => {
                self.on_stop_old_master().await;
                Some(ClusterResponse::Ack)
            }
        }
    }

    async fn on_discovery_events(&self, events: Vec<DiscoveryEvent>) -> ClusterResponse {
        if self.is_master() {
            let received = events.len();
            let applied = self.apply_discovery_events(events).await;
            tracing::debug!(received, applied, "Discovery events received");
        }
        ClusterResponse::Ack
    }

    fn on_coordinator_state(&self, master_view: Vec<ProxyState>) -> Option<PeerCoordinatorState> {
        if self.is_master() {
            return None;
        }
        // Report the view held so far; a newly elected master may know less.
        let proxies = self.replicated_view();
        self.store_replicated(master_view);
        Some(PeerCoordinatorState {
            node: self.node_id.clone(),
            pending_events: self.coordinator.get_pending_discovery_events(),
            requests: self.status_requests(self.load.load()),
            proxies,
        })
    }

    fn on_status_complete(&self, complete: ClusterStatusComplete) {
        self.ledger().adopt_floors(&complete.acknowledged);
        if let Some(&up_to) = complete.acknowledged.get(&self.node_id) {
            self.coordinator.acknowledge_discovery_events(up_to);
        }
        self.store_replicated(complete.proxies);
    }

    async fn on_stop_old_master(&self) {
        if self.is_master() {
            tracing::warn!(node = %self.node_id, "Another node announced mastership, stepping down");
            self.set_master(false);
        } else {
            tracing::info!(node = %self.node_id, "New master elected, releasing proxy connections");
        }
        if let Err(e) = self.coordinator.shutdown().await {
            tracing::warn!(error = %e, "Failed to shut down local proxy handler");
        }
    }
}

/// Map a handler result to a reply; handler failures become absent.
fn answer<T>(op: &'static str, result: HandlerResult<T>, reply: impl FnOnce(T) -> ClusterResponse) -> Option<ClusterResponse> {
    match result {
        Ok(value) => Some(reply(value)),
        Err(e) => {
            tracing::warn!(op, error = %e, "Local handler failed answering cluster call");
            None
        }
    }
}
