//! Reset-request construction.
//!
//! # Data Flow
//! ```text
//! proxy in error (handler status refresh, master only)
//!     → get_reset_requests(peer context map)
//!         local walk: CONFIG per engine → ENABLE/DISABLE per context → stale REMOVE_APP
//!         fan-out GetResetRequests → every peer answers get_local_reset_requests
//!     → local commands ++ flattened remote commands (reply order)
//! ```
//!
//! # Design Decisions
//! - A non-master answers only the peer variant; it never inspects its
//!   container on behalf of a proxy
//! - Config is read per call so reloads apply to the next reset

pub mod factory;
pub mod filter;

use std::sync::Arc;
use arc_swap::ArcSwap;
use async_trait::async_trait;

pub use factory::{DefaultRequestFactory, RequestFactory};
pub use filter::ContextFilter;

use crate::cluster::rpc::{fan_out, flatten_present, ClusterRpc, GetResetRequestsCall};
use crate::config::CoordinatorConfig;
use crate::container::{ContainerTopology, Engine};
use crate::election::ElectionOracle;
use crate::model::{CommandType, PeerContextMap, ProxyCommand};

/// Produces the commands that bring a proxy back in sync.
#[async_trait]
pub trait ResetRequestSource: Send + Sync {
    /// Commands for the whole cluster. Empty unless this node is master.
    async fn get_reset_requests(&self, peer_contexts: &PeerContextMap) -> Vec<ProxyCommand>;

    /// Commands for this node's engines only.
    fn get_local_reset_requests(&self, peer_contexts: &PeerContextMap) -> Vec<ProxyCommand>;
}

/// Builds reset requests from the local container and the cluster.
pub struct ResetRequestBuilder {
    election: Arc<dyn ElectionOracle>,
    rpc: Arc<dyn ClusterRpc>,
    container: Arc<dyn ContainerTopology>,
    factory: Arc<dyn RequestFactory>,
    config: Arc<ArcSwap<CoordinatorConfig>>,
}

impl ResetRequestBuilder {
    pub fn new(
        election: Arc<dyn ElectionOracle>,
        rpc: Arc<dyn ClusterRpc>,
        container: Arc<dyn ContainerTopology>,
        factory: Arc<dyn RequestFactory>,
        config: Arc<ArcSwap<CoordinatorConfig>>,
    ) -> Self {
        Self {
            election,
            rpc,
            container,
            factory,
            config,
        }
    }

    fn walk(&self, engines: &[Engine], peer_contexts: &PeerContextMap) -> Vec<ProxyCommand> {
        let config = self.config.load();
        let filter = ContextFilter::from_config(&config.contexts);
        let advertise = if filter.auto_enable() {
            CommandType::EnableApp
        } else {
            CommandType::DisableApp
        };

        let mut requests = Vec::new();
        for engine in engines {
            requests.push(self.factory.config_request(engine, &config.node, &config.balancer));

            for host in &engine.hosts {
                let aliases = host.alias_set();
                for context in &host.contexts {
                    if filter.is_excluded(host, &context.path) || !context.started {
                        continue;
                    }
                    requests.push(self.factory.context_request(advertise, &engine.route, &context.path, &aliases));
                }
            }

            requests.extend(self.stale_removals(engine, &filter, peer_contexts));
        }
        requests
    }

    /// REMOVE_APP for contexts the proxy still lists under this engine's
    /// route that are no longer advertised locally.
    fn stale_removals(&self, engine: &Engine, filter: &ContextFilter, peer_contexts: &PeerContextMap) -> Vec<ProxyCommand> {
        let Some(virtual_hosts) = peer_contexts.get(&engine.route) else {
            return Vec::new();
        };

        let mut removals = Vec::new();
        for vhost in virtual_hosts {
            let local_host = engine
                .hosts
                .iter()
                .find(|h| h.alias_set().iter().any(|alias| vhost.answers_to(alias)));

            for path in &vhost.contexts {
                let advertised = local_host.is_some_and(|host| {
                    host.context(path).is_some_and(|c| c.started) && !filter.is_excluded(host, path)
                });
                if !advertised {
                    let mut aliases = vhost.aliases.clone();
                    aliases.insert(vhost.name.clone());
                    tracing::debug!(route = %engine.route, context = %path, "Removing stale context from proxy");
                    removals.push(self.factory.context_request(CommandType::RemoveApp, &engine.route, path, &aliases));
                }
            }
        }
        removals
    }
}

#[async_trait]
impl ResetRequestSource for ResetRequestBuilder {
    async fn get_reset_requests(&self, peer_contexts: &PeerContextMap) -> Vec<ProxyCommand> {
        if !self.election.is_master_node() {
            return Vec::new();
        }

        let mut requests = self.get_local_reset_requests(peer_contexts);
        let local = requests.len();

        let replies = fan_out(self.rpc.as_ref(), GetResetRequestsCall(peer_contexts.clone())).await;
        requests.extend(flatten_present(replies));

        tracing::debug!(local, remote = requests.len() - local, "Reset requests assembled");
        requests
    }

    fn get_local_reset_requests(&self, peer_contexts: &PeerContextMap) -> Vec<ProxyCommand> {
        match self.container.engines() {
            Some(engines) => self.walk(&engines, peer_contexts),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::rpc::{ClusterRequest, ClusterResponse};
    use crate::config::{ContextConfig, ContextsConfig, EngineConfig, HostConfig};
    use crate::container::StaticContainer;
    use crate::election::SwitchableElection;
    use crate::model::VirtualHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoPeers;

    #[async_trait]
    impl ClusterRpc for NoPeers {
        async fn call_all(&self, _request: ClusterRequest) -> Vec<Option<ClusterResponse>> {
            Vec::new()
        }

        fn notify_all(&self, _request: ClusterRequest) {}
    }

    struct CountingContainer {
        inner: StaticContainer,
        reads: AtomicUsize,
    }

    impl ContainerTopology for CountingContainer {
        fn engines(&self) -> Option<Vec<Engine>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.engines()
        }
    }

    fn engines() -> Vec<EngineConfig> {
        vec![EngineConfig {
            name: "catalina".into(),
            route: "node1".into(),
            connector_address: "10.0.0.1:8009".into(),
            hosts: vec![HostConfig {
                name: "localhost".into(),
                aliases: vec!["example.com".into()],
                contexts: vec![
                    ContextConfig { path: "/app".into(), started: true },
                    ContextConfig { path: "/stopped".into(), started: false },
                    ContextConfig { path: "/admin".into(), started: true },
                ],
            }],
        }]
    }

    fn builder(master: bool, contexts: ContextsConfig) -> (ResetRequestBuilder, Arc<CountingContainer>) {
        let container = Arc::new(CountingContainer {
            inner: StaticContainer::from_config(&engines()),
            reads: AtomicUsize::new(0),
        });
        let config = CoordinatorConfig { contexts, ..Default::default() };
        let builder = ResetRequestBuilder::new(
            Arc::new(SwitchableElection::new(master)),
            Arc::new(NoPeers),
            container.clone(),
            Arc::new(DefaultRequestFactory),
            Arc::new(ArcSwap::from_pointee(config)),
        );
        (builder, container)
    }

    fn excluding_admin(auto_enable: bool) -> ContextsConfig {
        ContextsConfig { excluded: vec!["/admin".into()], auto_enable }
    }

    #[tokio::test]
    async fn test_non_master_returns_nothing_without_reading_container() {
        let (builder, container) = builder(false, ContextsConfig::default());
        assert!(builder.get_reset_requests(&PeerContextMap::new()).await.is_empty());
        assert_eq!(container.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_walk_skips_stopped_and_excluded() {
        let (builder, _) = builder(false, excluding_admin(true));
        let requests = builder.get_local_reset_requests(&PeerContextMap::new());

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].command_type, CommandType::Config);
        assert_eq!(requests[1].command_type, CommandType::EnableApp);
        assert_eq!(requests[1].parameter("Context"), Some("/app"));
        assert_eq!(requests[1].parameter("Alias"), Some("example.com,localhost"));
    }

    #[test]
    fn test_auto_enable_off_disables() {
        let (builder, _) = builder(true, excluding_admin(false));
        let requests = builder.get_local_reset_requests(&PeerContextMap::new());
        assert_eq!(requests[1].command_type, CommandType::DisableApp);
    }

    #[test]
    fn test_stale_proxy_contexts_are_removed() {
        let (builder, _) = builder(true, excluding_admin(true));
        let mut vhost = VirtualHost::new("localhost");
        vhost.contexts.extend(["/app".to_string(), "/gone".to_string(), "/admin".to_string()]);
        let peer_contexts = PeerContextMap::from([("node1".to_string(), vec![vhost])]);

        let requests = builder.get_local_reset_requests(&peer_contexts);
        let removed: Vec<_> = requests
            .iter()
            .filter(|r| r.command_type == CommandType::RemoveApp)
            .filter_map(|r| r.parameter("Context"))
            .collect();
        assert_eq!(removed, vec!["/admin", "/gone"]);
    }

    #[test]
    fn test_unregistered_container_yields_nothing() {
        let builder = ResetRequestBuilder::new(
            Arc::new(SwitchableElection::new(true)),
            Arc::new(NoPeers),
            Arc::new(StaticContainer::unregistered()),
            Arc::new(DefaultRequestFactory),
            Arc::new(ArcSwap::from_pointee(CoordinatorConfig::default())),
        );
        assert!(builder.get_local_reset_requests(&PeerContextMap::new()).is_empty());
    }
}
