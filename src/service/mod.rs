//! Top-level orchestrator.
//!
//! # Data Flow
//! ```text
//! status ticker (cycle.rs)
//!     → election transitions → coordinator reconciliation
//!     → reset cycle (generations) → coordinator.send_requests
//!     → master: handler.status, pull peer state, apply events, publish completion
//!
//! POST /cluster/rpc (dispatch.rs)
//!     → ProxyService::handle_rpc → coordinator / handler / reset builder
//!
//! /admin (admin module)
//!     → ProxyService admin operations → coordinator / reset builder / factory
//! ```

pub mod cycle;
pub mod dispatch;
pub mod ledger;
pub mod load;

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ledger::EventLedger;
pub use load::{ConfiguredLoad, LoadProvider};

use crate::cluster::{ClusterRpc, TransportError};
use crate::config::loader::ConfigError;
use crate::config::{CoordinatorConfig, EngineConfig};
use crate::container::{ContainerTopology, Engine, StaticContainer};
use crate::coordinator::{ClusteredProxyCoordinator, ResetGenerations};
use crate::election::{ElectionOracle, SwitchableElection};
use crate::handler::{
    ConnectionListener, EstablishedFlag, HandlerError, HandlerResult, ProxyHandler,
    SimulatedProxyHandler,
};
use crate::model::{
    CommandType, DiscoveryEvent, NodeId, ProxyBatchResponses, ProxyCommand, ProxyEndpoint,
    ProxyResponses, ProxyState,
};
use crate::reset::{DefaultRequestFactory, RequestFactory, ResetRequestBuilder, ResetRequestSource};

/// Startup and runtime failures of the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Proxy handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Context operation requested through the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextAction {
    Enable,
    Disable,
    Stop,
}

impl ContextAction {
    fn command_type(self) -> CommandType {
        match self {
            ContextAction::Enable => CommandType::EnableApp,
            ContextAction::Disable => CommandType::DisableApp,
            ContextAction::Stop => CommandType::StopApp,
        }
    }
}

/// Selects contexts; every unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSelector {
    pub route: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
}

/// Snapshot reported by `GET /admin/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub node: NodeId,
    pub master: bool,
    pub established: bool,
    pub reset_necessary: bool,
    pub error_generation: u64,
    pub acknowledged_generation: u64,
    pub pending_discovery_events: usize,
    pub proxies: Vec<ProxyState>,
    /// The proxy states last published by the master.
    pub replicated: Vec<ProxyState>,
}

/// Everything a node needs to take part in proxy coordination.
pub struct ProxyService {
    node_id: NodeId,
    config: Arc<ArcSwap<CoordinatorConfig>>,
    election: Arc<SwitchableElection>,
    rpc: Arc<dyn ClusterRpc>,
    container: Arc<StaticContainer>,
    factory: Arc<dyn RequestFactory>,
    reset_requests: Arc<ResetRequestBuilder>,
    coordinator: Arc<ClusteredProxyCoordinator>,
    load: Arc<dyn LoadProvider>,
    listener: Arc<EstablishedFlag>,
    ledger: Mutex<EventLedger>,
    replicated: RwLock<Vec<ProxyState>>,
    was_master: AtomicBool,
}

impl ProxyService {
    /// A node driving the simulated proxy handler.
    pub fn new(
        node_id: NodeId,
        config: Arc<ArcSwap<CoordinatorConfig>>,
        election: Arc<SwitchableElection>,
        rpc: Arc<dyn ClusterRpc>,
        container: Arc<StaticContainer>,
    ) -> Self {
        Self::with_handler(node_id, config, election, rpc, container, |source| -> Arc<dyn ProxyHandler> {
            Arc::new(SimulatedProxyHandler::new(source))
        })
    }

    /// A node whose handler is built from the reset-request source.
    pub fn with_handler<F>(
        node_id: NodeId,
        config: Arc<ArcSwap<CoordinatorConfig>>,
        election: Arc<SwitchableElection>,
        rpc: Arc<dyn ClusterRpc>,
        container: Arc<StaticContainer>,
        make_handler: F,
    ) -> Self
    where
        F: FnOnce(Arc<dyn ResetRequestSource>) -> Arc<dyn ProxyHandler>,
    {
        let oracle: Arc<dyn ElectionOracle> = election.clone();
        let factory: Arc<dyn RequestFactory> = Arc::new(DefaultRequestFactory);
        let reset_requests = Arc::new(ResetRequestBuilder::new(
            oracle.clone(),
            rpc.clone(),
            container.clone(),
            factory.clone(),
            config.clone(),
        ));
        let source: Arc<dyn ResetRequestSource> = reset_requests.clone();
        let handler = make_handler(source);
        let journal_capacity = config.load().cluster.journal_capacity;
        let coordinator = Arc::new(ClusteredProxyCoordinator::new(
            node_id.clone(),
            handler,
            oracle,
            rpc.clone(),
            journal_capacity,
        ));

        Self {
            node_id,
            load: Arc::new(ConfiguredLoad::new(config.clone())),
            config,
            election,
            rpc,
            container,
            factory,
            reset_requests,
            coordinator,
            listener: EstablishedFlag::new(),
            ledger: Mutex::new(EventLedger::new()),
            replicated: RwLock::new(Vec::new()),
            was_master: AtomicBool::new(false),
        }
    }

    /// Replace the load source (defaults to `node.fixed_load`).
    pub fn with_load(mut self, load: Arc<dyn LoadProvider>) -> Self {
        self.load = load;
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn coordinator(&self) -> &Arc<ClusteredProxyCoordinator> {
        &self.coordinator
    }

    pub fn reset_requests(&self) -> &Arc<ResetRequestBuilder> {
        &self.reset_requests
    }

    pub fn config(&self) -> &Arc<ArcSwap<CoordinatorConfig>> {
        &self.config
    }

    pub fn is_master(&self) -> bool {
        self.election.is_master_node()
    }

    /// Register the configured proxies through the coordinator.
    pub async fn start(&self) -> HandlerResult<()> {
        let endpoints: Vec<ProxyEndpoint> = self
            .config
            .load()
            .proxies
            .addresses
            .iter()
            .map(ProxyEndpoint::new)
            .collect();
        tracing::info!(node = %self.node_id, proxies = endpoints.len(), master = self.is_master(), "Starting proxy coordination");
        self.coordinator.init(endpoints, self.listener.clone()).await
    }

    /// Close local proxy connections.
    pub async fn stop(&self) -> HandlerResult<()> {
        tracing::info!(node = %self.node_id, "Stopping proxy coordination");
        self.coordinator.shutdown().await
    }

    pub fn status(&self) -> ServiceStatus {
        let generations: ResetGenerations = self.coordinator.generations();
        ServiceStatus {
            node: self.node_id.clone(),
            master: self.is_master(),
            established: self.listener.is_established(),
            reset_necessary: generations.is_reset_necessary(),
            error_generation: generations.error_generation(),
            acknowledged_generation: generations.acknowledged_generation(),
            pending_discovery_events: self.coordinator.get_pending_discovery_events().len(),
            proxies: self.coordinator.get_proxy_states(),
            replicated: self.replicated_view(),
        }
    }

    pub async fn add_proxy(&self, address: &str) -> HandlerResult<()> {
        self.coordinator.add_proxy(ProxyEndpoint::new(address)).await
    }

    pub async fn remove_proxy(&self, address: &str) -> HandlerResult<()> {
        self.coordinator.remove_proxy(ProxyEndpoint::new(address)).await
    }

    pub async fn is_proxy_health_ok(&self) -> bool {
        self.coordinator.is_proxy_health_ok().await
    }

    pub async fn reset(&self) -> HandlerResult<()> {
        self.coordinator.reset().await
    }

    /// Force every proxy through a full resync on the next status cycle.
    pub async fn refresh(&self) -> HandlerResult<()> {
        self.coordinator.mark_proxies_in_error().await
    }

    pub async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses> {
        self.coordinator.send_request(command).await
    }

    /// PING the proxies, or one route through them.
    pub async fn ping(&self, route: Option<&str>) -> HandlerResult<ProxyResponses> {
        self.coordinator.send_request(self.factory.ping_request(route)).await
    }

    /// Register a reloaded engine list and drop removed engines from the proxies.
    ///
    /// Every engine whose route disappeared gets a wildcard REMOVE_APP;
    /// engines that remain are picked up by the next reset.
    pub async fn reload_engines(&self, engines: &[EngineConfig]) -> HandlerResult<ProxyBatchResponses> {
        let previous = self.container.engines().unwrap_or_default();
        self.container.register(engines);

        let removals: Vec<ProxyCommand> = previous
            .iter()
            .filter(|old| !engines.iter().any(|e| e.route == old.route))
            .map(|old| self.factory.remove_engine_request(old))
            .collect();

        tracing::info!(engines = engines.len(), removed = removals.len(), "Engines reloaded");
        if removals.is_empty() {
            return Ok(ProxyBatchResponses::new());
        }
        self.coordinator.send_requests(removals).await
    }

    /// Apply `action` to every selected context and tell the proxies.
    ///
    /// `Stop` also marks the contexts stopped locally so later resets leave
    /// them out; `Enable` marks them started again.
    pub async fn apply_context_action(
        &self,
        action: ContextAction,
        selector: &ContextSelector,
    ) -> HandlerResult<ProxyBatchResponses> {
        let engines = self.container.engines().unwrap_or_default();
        let mut commands = Vec::new();

        for engine in &engines {
            if selector.route.as_deref().is_some_and(|r| r != engine.route) {
                continue;
            }
            for host in &engine.hosts {
                if selector.host.as_deref().is_some_and(|h| h != host.name) {
                    continue;
                }
                let aliases = host.alias_set();
                for context in &host.contexts {
                    if selector.path.as_deref().is_some_and(|p| p != context.path) {
                        continue;
                    }
                    commands.push(self.factory.context_request(
                        action.command_type(),
                        &engine.route,
                        &context.path,
                        &aliases,
                    ));
                    match action {
                        ContextAction::Stop => {
                            self.container.set_started(&engine.route, &host.name, &context.path, false);
                        }
                        ContextAction::Enable => {
                            self.container.set_started(&engine.route, &host.name, &context.path, true);
                        }
                        ContextAction::Disable => {}
                    }
                }
            }
        }

        tracing::info!(action = ?action, commands = commands.len(), "Context action");
        if commands.is_empty() {
            return Ok(ProxyBatchResponses::new());
        }
        self.coordinator.send_requests(commands).await
    }

    /// Switch this node's mastership. Returns the previous value.
    pub fn set_master(&self, master: bool) -> bool {
        let previous = self.election.set_master(master);
        tracing::info!(node = %self.node_id, previous, master, "Mastership switched");
        previous
    }

    pub fn discovery_events(&self) -> Vec<DiscoveryEvent> {
        self.coordinator.get_pending_discovery_events()
    }

    pub fn replicated_view(&self) -> Vec<ProxyState> {
        match self.replicated.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_replicated(&self, proxies: Vec<ProxyState>) {
        match self.replicated.write() {
            Ok(mut guard) => *guard = proxies,
            Err(poisoned) => *poisoned.into_inner() = proxies,
        }
    }

    fn ledger(&self) -> MutexGuard<'_, EventLedger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// STATUS requests carrying this node's load, one per engine.
    fn status_requests(&self, load: u8) -> Vec<ProxyCommand> {
        self.container
            .engines()
            .unwrap_or_default()
            .iter()
            .map(|engine: &Engine| self.factory.status_request(engine, load))
            .collect()
    }

    /// Apply discovery events to the local handler, skipping those already applied.
    async fn apply_discovery_events(&self, events: Vec<DiscoveryEvent>) -> usize {
        let admitted: Vec<DiscoveryEvent> = {
            let mut ledger = self.ledger();
            events.into_iter().filter(|e| ledger.admit(e)).collect()
        };

        let handler = self.coordinator.handler();
        for event in &admitted {
            let result = if event.addition {
                handler.add_proxy(event.endpoint.clone()).await
            } else {
                handler.remove_proxy(event.endpoint.clone()).await
            };
            match result {
                Ok(()) => tracing::info!(
                    sender = %event.sender,
                    event_index = event.event_index,
                    proxy = %event.endpoint.address,
                    addition = event.addition,
                    "Applied discovery event"
                ),
                Err(e) => tracing::warn!(
                    sender = %event.sender,
                    event_index = event.event_index,
                    proxy = %event.endpoint.address,
                    error = %e,
                    "Failed to apply discovery event"
                ),
            }
        }
        admitted.len()
    }

    /// Acknowledgement watermarks per sender.
    fn acknowledged(&self) -> BTreeMap<NodeId, u64> {
        self.ledger().acknowledged()
    }
}
