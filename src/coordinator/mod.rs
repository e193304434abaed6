//! Clustered proxy coordinator.
//!
//! # Data Flow
//! ```text
//! admin / status cycle / inbound RPC
//!     → ClusteredProxyCoordinator (samples is_master_node() once per call)
//!         master     → LocalRoute     → ProxyHandler
//!         non-master → BroadcastRoute → DiscoveryJournal + ClusterRpc fan-out
//!     → ResetGenerations (mark / initiated / completed)
//! ```
//!
//! # Design Decisions
//! - Only the master holds proxy connections; every other node forwards
//! - The journal and the generation counters share one lock, held only for
//!   in-memory updates and never across an await
//! - A mastership flip during a call is not detected; the call completes on
//!   the route chosen at entry

pub mod generation;
pub mod journal;
mod route;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

pub use generation::ResetGenerations;
pub use journal::DiscoveryJournal;

use crate::cluster::ClusterRpc;
use crate::election::ElectionOracle;
use crate::handler::{ConnectionListener, HandlerResult, ProxyHandler};
use crate::model::{
    DiscoveryEvent, NodeId, ProxyBatchResponses, ProxyCommand, ProxyEndpoint, ProxyResponses,
    ProxyState,
};
use crate::observability::metrics;
use route::{BroadcastRoute, LocalRoute, ProxyRoute};

/// Cross-call mutable state of one coordinator.
pub(crate) struct CoordinatorState {
    inner: Mutex<Guarded>,
}

pub(crate) struct Guarded {
    pub(crate) journal: DiscoveryJournal,
    pub(crate) generations: ResetGenerations,
}

impl CoordinatorState {
    fn new(node_id: NodeId, journal_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Guarded {
                journal: DiscoveryJournal::new(node_id, journal_capacity),
                generations: ResetGenerations::new(),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Guarded> {
        // Updates never leave the guarded data half-written, so poison is ignored.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Mediates every proxy operation between the local handler and the cluster.
pub struct ClusteredProxyCoordinator {
    node_id: NodeId,
    handler: Arc<dyn ProxyHandler>,
    election: Arc<dyn ElectionOracle>,
    state: Arc<CoordinatorState>,
    local: LocalRoute,
    broadcast: BroadcastRoute,
}

impl ClusteredProxyCoordinator {
    pub fn new(
        node_id: NodeId,
        handler: Arc<dyn ProxyHandler>,
        election: Arc<dyn ElectionOracle>,
        rpc: Arc<dyn ClusterRpc>,
        journal_capacity: usize,
    ) -> Self {
        let state = Arc::new(CoordinatorState::new(node_id.clone(), journal_capacity));
        Self {
            node_id,
            local: LocalRoute { handler: handler.clone() },
            broadcast: BroadcastRoute {
                handler: handler.clone(),
                rpc,
                state: state.clone(),
            },
            handler,
            election,
            state,
        }
    }

    fn route(&self) -> &dyn ProxyRoute {
        if self.election.is_master_node() {
            &self.local
        } else {
            &self.broadcast
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The local handler, for callers that must bypass routing (the master's
    /// own status refresh, inbound RPC answered on the master).
    pub fn handler(&self) -> &Arc<dyn ProxyHandler> {
        &self.handler
    }

    pub async fn init(&self, endpoints: Vec<ProxyEndpoint>, listener: Arc<dyn ConnectionListener>) -> HandlerResult<()> {
        self.route().init(endpoints, listener).await
    }

    pub async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.route().add_proxy(endpoint).await
    }

    pub async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.route().remove_proxy(endpoint).await
    }

    /// Reconcile the local handler with the authoritative proxy set and
    /// return the resulting snapshot.
    ///
    /// Called on a node that has just become master; always acts locally.
    pub async fn update_servers_from_master_node(&self, authoritative: &[ProxyState]) -> HandlerResult<Vec<ProxyState>> {
        let known: BTreeSet<String> = self
            .handler
            .get_proxy_states()
            .into_iter()
            .map(|s| s.address)
            .collect();
        let wanted: BTreeSet<&str> = authoritative.iter().map(|s| s.address.as_str()).collect();

        for state in authoritative {
            if !known.contains(&state.address) {
                tracing::info!(proxy = %state.address, established = state.established, "Adopting proxy from cluster view");
                self.handler.add_proxy(state.endpoint()).await?;
            }
        }

        for address in &known {
            if !wanted.contains(address.as_str()) {
                tracing::info!(proxy = %address, "Dropping proxy absent from cluster view");
                self.handler.remove_proxy(ProxyEndpoint::new(address.clone())).await?;
            }
        }

        Ok(self.handler.get_proxy_states())
    }

    pub fn get_proxy_states(&self) -> Vec<ProxyState> {
        self.handler.get_proxy_states()
    }

    /// Health of the proxies as seen by the master; `false` if no master answers.
    pub async fn is_proxy_health_ok(&self) -> bool {
        self.route().is_proxy_health_ok().await
    }

    /// Mark the proxies in error and register that a reset is needed here.
    pub async fn mark_proxies_in_error(&self) -> HandlerResult<()> {
        let result = self.route().mark_proxies_in_error().await;
        self.state.lock().generations.mark_error();
        result
    }

    pub async fn reset(&self) -> HandlerResult<()> {
        self.route().reset().await
    }

    pub async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses> {
        self.route().send_request(command).await
    }

    pub async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses> {
        self.route().send_requests(commands).await
    }

    pub async fn shutdown(&self) -> HandlerResult<()> {
        self.handler.shutdown().await
    }

    /// Journal contents in recording order. Not cleared.
    pub fn get_pending_discovery_events(&self) -> Vec<DiscoveryEvent> {
        self.state.lock().journal.pending()
    }

    /// Drop journaled events a master has applied.
    pub fn acknowledge_discovery_events(&self, up_to: u64) -> usize {
        let dropped = self.state.lock().journal.acknowledge(up_to);
        if dropped > 0 {
            tracing::debug!(up_to, dropped, "Discovery events acknowledged");
        }
        dropped
    }

    pub fn is_reset_necessary(&self) -> bool {
        self.state.lock().generations.is_reset_necessary()
    }

    pub fn reset_initiated(&self) {
        self.state.lock().generations.reset_initiated();
        metrics::record_reset("initiated");
    }

    pub fn reset_completed(&self) {
        self.state.lock().generations.reset_completed();
        metrics::record_reset("completed");
    }

    /// Copy of the generation counters.
    pub fn generations(&self) -> ResetGenerations {
        self.state.lock().generations
    }
}
