//! Shared collaborators for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock, Weak};

use arc_swap::ArcSwap;
use async_trait::async_trait;

use proxy_coordinator::cluster::{ClusterRequest, ClusterResponse, ClusterRpc};
use proxy_coordinator::config::{ContextConfig, CoordinatorConfig, EngineConfig, HostConfig};
use proxy_coordinator::container::StaticContainer;
use proxy_coordinator::election::SwitchableElection;
use proxy_coordinator::handler::{ConnectionListener, HandlerError, HandlerResult, ProxyHandler};
use proxy_coordinator::model::{
    NodeId, ProxyBatchResponses, ProxyCommand, ProxyEndpoint, ProxyResponses, ProxyState, ProxyStatus,
};
use proxy_coordinator::ProxyService;

/// One call made on a [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerCall {
    Init(Vec<ProxyEndpoint>),
    Add(ProxyEndpoint),
    Remove(ProxyEndpoint),
    MarkInError,
    Reset,
    Status,
    Send(ProxyCommand),
    SendAll(Vec<ProxyCommand>),
    Shutdown,
}

/// Records every call and keeps a minimal proxy table.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<HandlerCall>>,
    proxies: Mutex<BTreeMap<String, ProxyState>>,
    healthy: Mutex<bool>,
    fail_with: Mutex<Option<String>>,
    responses: Mutex<ProxyResponses>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_proxies(addresses: &[&str]) -> Arc<Self> {
        let handler = Self::default();
        {
            let mut proxies = handler.proxies.lock().unwrap();
            for address in addresses {
                proxies.insert(address.to_string(), ProxyState::new(*address, ProxyStatus::Ok, true));
            }
        }
        Arc::new(handler)
    }

    pub fn calls(&self) -> Vec<HandlerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }

    /// Make every mutating call fail with a proxy error.
    pub fn fail(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn respond(&self, proxy: &str, response: &str) {
        self.responses.lock().unwrap().insert(proxy.to_string(), response.to_string());
    }

    fn record(&self, call: HandlerCall) -> HandlerResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with.lock().unwrap().clone() {
            Some(message) => Err(HandlerError::Proxy {
                proxy: "recording".to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProxyHandler for RecordingHandler {
    async fn init(&self, endpoints: Vec<ProxyEndpoint>, _listener: Arc<dyn ConnectionListener>) -> HandlerResult<()> {
        self.record(HandlerCall::Init(endpoints))
    }

    async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.record(HandlerCall::Add(endpoint.clone()))?;
        self.proxies.lock().unwrap().insert(
            endpoint.address.clone(),
            ProxyState::new(endpoint.address, ProxyStatus::Error, endpoint.established),
        );
        Ok(())
    }

    async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.record(HandlerCall::Remove(endpoint.clone()))?;
        self.proxies.lock().unwrap().remove(&endpoint.address);
        Ok(())
    }

    fn get_proxy_states(&self) -> Vec<ProxyState> {
        self.proxies.lock().unwrap().values().cloned().collect()
    }

    fn is_proxy_health_ok(&self) -> bool {
        *self.healthy.lock().unwrap()
    }

    async fn mark_proxies_in_error(&self) -> HandlerResult<()> {
        self.record(HandlerCall::MarkInError)
    }

    async fn reset(&self) -> HandlerResult<()> {
        self.record(HandlerCall::Reset)
    }

    async fn status(&self) -> HandlerResult<()> {
        self.record(HandlerCall::Status)
    }

    async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses> {
        self.record(HandlerCall::Send(command))?;
        Ok(self.responses.lock().unwrap().clone())
    }

    async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses> {
        self.record(HandlerCall::SendAll(commands))?;
        Ok(ProxyBatchResponses::new())
    }

    async fn shutdown(&self) -> HandlerResult<()> {
        self.record(HandlerCall::Shutdown)
    }
}

/// Answers every call with a fixed reply list and records what was sent.
#[derive(Default)]
pub struct ScriptedRpc {
    replies: Mutex<Vec<Option<ClusterResponse>>>,
    calls: Mutex<Vec<ClusterRequest>>,
    notifications: Mutex<Vec<ClusterRequest>>,
}

impl ScriptedRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replying(replies: Vec<Option<ClusterResponse>>) -> Arc<Self> {
        let rpc = Self::default();
        *rpc.replies.lock().unwrap() = replies;
        Arc::new(rpc)
    }

    pub fn calls(&self) -> Vec<ClusterRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<ClusterRequest> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterRpc for ScriptedRpc {
    async fn call_all(&self, request: ClusterRequest) -> Vec<Option<ClusterResponse>> {
        self.calls.lock().unwrap().push(request);
        self.replies.lock().unwrap().clone()
    }

    fn notify_all(&self, request: ClusterRequest) {
        self.notifications.lock().unwrap().push(request);
    }
}

/// An in-process cluster: every member's RPC calls the others' `handle_rpc`.
///
/// Notifications are queued until [`LoopbackNetwork::flush`] so tests decide
/// when fire-and-forget messages land.
#[derive(Default)]
pub struct LoopbackNetwork {
    members: RwLock<Vec<Weak<ProxyService>>>,
    queued: Mutex<Vec<(usize, ClusterRequest)>>,
    down: Mutex<BTreeSet<NodeId>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a member named `name` with the given configuration.
    pub fn join(self: &Arc<Self>, name: &str, master: bool, config: CoordinatorConfig) -> Arc<ProxyService> {
        let mut members = self.members.write().unwrap();
        let rpc = Arc::new(LoopbackRpc {
            network: self.clone(),
            me: members.len(),
        });
        let container = Arc::new(StaticContainer::from_config(&config.engines));
        let service = Arc::new(ProxyService::new(
            NodeId::new(name),
            Arc::new(ArcSwap::from_pointee(config)),
            Arc::new(SwitchableElection::new(master)),
            rpc,
            container,
        ));
        members.push(Arc::downgrade(&service));
        service
    }

    /// Peers of `me` in join order; `None` for a member that is down.
    fn peers_of(&self, me: usize) -> Vec<Option<Arc<ProxyService>>> {
        let down = self.down.lock().unwrap().clone();
        self.members
            .read()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != me)
            .filter_map(|(_, m)| m.upgrade())
            .map(|peer| (!down.contains(peer.node_id())).then_some(peer))
            .collect()
    }

    /// Make `node` unreachable (or reachable again) for calls and notifications.
    pub fn set_down(&self, node: &ProxyService, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(node.node_id().clone());
        } else {
            set.remove(node.node_id());
        }
    }

    /// Deliver every queued notification.
    pub async fn flush(&self) {
        let queued: Vec<_> = std::mem::take(&mut *self.queued.lock().unwrap());
        for (from, request) in queued {
            for peer in self.peers_of(from).into_iter().flatten() {
                peer.handle_rpc(request.clone()).await;
            }
        }
    }

    /// Lose every queued notification.
    pub fn drop_queued(&self) -> usize {
        std::mem::take(&mut *self.queued.lock().unwrap()).len()
    }
}

pub struct LoopbackRpc {
    network: Arc<LoopbackNetwork>,
    me: usize,
}

#[async_trait]
impl ClusterRpc for LoopbackRpc {
    async fn call_all(&self, request: ClusterRequest) -> Vec<Option<ClusterResponse>> {
        let mut replies = Vec::new();
        for peer in self.network.peers_of(self.me) {
            let reply = match peer {
                Some(peer) => peer.handle_rpc(request.clone()).await,
                None => None,
            };
            replies.push(reply);
        }
        replies
    }

    fn notify_all(&self, request: ClusterRequest) {
        self.network.queued.lock().unwrap().push((self.me, request));
    }
}

/// A node configuration with one engine serving `/app` on localhost.
pub fn node_config(route: &str, proxies: &[&str]) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::default();
    config.node.name = route.to_string();
    config.proxies.addresses = proxies.iter().map(|p| p.to_string()).collect();
    config.engines = vec![EngineConfig {
        name: "catalina".to_string(),
        route: route.to_string(),
        connector_address: "127.0.0.1:8009".to_string(),
        hosts: vec![HostConfig {
            name: "localhost".to_string(),
            aliases: vec!["example.com".to_string()],
            contexts: vec![ContextConfig {
                path: "/app".to_string(),
                started: true,
            }],
        }],
    }];
    config
}
