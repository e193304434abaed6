//! Dry-run proxy handler.
//!
//! Tracks proxy health and the context view each proxy would hold, without
//! opening connections. Every proxy it is told about is reachable; a proxy in
//! ERROR is rebuilt from the reset-request source on the next status refresh.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use dashmap::DashMap;

use crate::handler::{ConnectionListener, HandlerError, HandlerResult, ProxyHandler};
use crate::model::{
    CommandType, PeerContextMap, ProxyBatchResponses, ProxyCommand, ProxyEndpoint,
    ProxyResponses, ProxyState, ProxyStatus, VirtualHost,
};
use crate::observability::metrics;
use crate::reset::ResetRequestSource;

#[derive(Debug, Clone)]
struct SimulatedProxy {
    status: ProxyStatus,
    established: bool,
    view: PeerContextMap,
}

impl SimulatedProxy {
    fn new(endpoint: &ProxyEndpoint) -> Self {
        Self {
            // Unconfigured until the first resync.
            status: ProxyStatus::Error,
            established: endpoint.established,
            view: PeerContextMap::new(),
        }
    }

    fn apply(&mut self, command: &ProxyCommand) {
        let Some(route) = command.route.as_deref() else {
            return;
        };
        match command.command_type {
            CommandType::Config => {
                self.view.entry(route.to_string()).or_default();
            }
            CommandType::EnableApp | CommandType::DisableApp | CommandType::StopApp => {
                let (Some(path), Some(aliases)) = (command.parameter("Context"), command.parameter("Alias")) else {
                    return;
                };
                let aliases: BTreeSet<String> = aliases.split(',').map(str::to_string).collect();
                let hosts = self.view.entry(route.to_string()).or_default();
                let index = match hosts.iter().position(|h| aliases.iter().any(|a| h.answers_to(a))) {
                    Some(i) => i,
                    None => {
                        let mut rest = aliases;
                        let name = rest.pop_first().unwrap_or_default();
                        let mut host = VirtualHost::new(name);
                        host.aliases = rest;
                        hosts.push(host);
                        hosts.len() - 1
                    }
                };
                hosts[index].contexts.insert(path.to_string());
            }
            CommandType::RemoveApp if command.wildcard => {
                self.view.remove(route);
            }
            CommandType::RemoveApp => {
                let Some(path) = command.parameter("Context") else {
                    return;
                };
                if let Some(hosts) = self.view.get_mut(route) {
                    for host in hosts.iter_mut() {
                        host.contexts.remove(path);
                    }
                    hosts.retain(|h| !h.contexts.is_empty());
                }
            }
            CommandType::Status | CommandType::Ping => {}
        }
    }
}

/// Reject commands a proxy could not route.
fn check_command(command: &ProxyCommand) -> HandlerResult<()> {
    let invalid = |reason: &str| HandlerError::InvalidCommand {
        command: command.command_type.to_string(),
        reason: reason.to_string(),
    };

    if command.command_type != CommandType::Ping && command.route.is_none() {
        return Err(invalid("missing route"));
    }
    let needs_context = match command.command_type {
        CommandType::EnableApp | CommandType::DisableApp | CommandType::StopApp => true,
        CommandType::RemoveApp => !command.wildcard,
        _ => false,
    };
    if needs_context && command.parameter("Context").is_none() {
        return Err(invalid("missing Context parameter"));
    }
    Ok(())
}

/// A proxy handler that performs no I/O.
pub struct SimulatedProxyHandler {
    proxies: DashMap<String, SimulatedProxy>,
    reset_source: Arc<dyn ResetRequestSource>,
    listener: RwLock<Option<Arc<dyn ConnectionListener>>>,
    shut_down: AtomicBool,
}

impl SimulatedProxyHandler {
    pub fn new(reset_source: Arc<dyn ResetRequestSource>) -> Self {
        Self {
            proxies: DashMap::new(),
            reset_source,
            listener: RwLock::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// The contexts a proxy currently holds, as it would report them.
    pub fn proxy_view(&self, address: &str) -> Option<PeerContextMap> {
        self.proxies.get(address).map(|p| p.view.clone())
    }

    fn ensure_running(&self) -> HandlerResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(HandlerError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn notify_established(&self, address: &str) {
        let listener = match self.listener.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(listener) = listener {
            listener.connection_established(address);
        }
    }

    fn addresses_in(&self, status: ProxyStatus) -> Vec<String> {
        self.proxies
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.key().clone())
            .collect()
    }

    fn apply_to_healthy(&self, command: &ProxyCommand) -> ProxyResponses {
        let mut responses = ProxyResponses::new();
        for mut proxy in self.proxies.iter_mut() {
            if proxy.status != ProxyStatus::Ok {
                continue;
            }
            proxy.apply(command);
            responses.insert(proxy.key().clone(), format!("Type={}-RSP&State=OK", command.command_type));
        }
        responses
    }

    async fn resync(&self, address: &str) {
        let view = match self.proxies.get(address) {
            Some(proxy) => proxy.view.clone(),
            None => return,
        };

        let commands = self.reset_source.get_reset_requests(&view).await;

        // The proxy may have been removed while the requests were built.
        let Some(mut proxy) = self.proxies.get_mut(address) else {
            return;
        };
        proxy.view.clear();
        for command in &commands {
            proxy.apply(command);
        }
        proxy.status = ProxyStatus::Ok;
        proxy.established = true;
        drop(proxy);

        tracing::info!(proxy = %address, commands = commands.len(), "Proxy resynchronized");
        metrics::record_proxy_health(address, true);
        self.notify_established(address);
    }
}

#[async_trait]
impl ProxyHandler for SimulatedProxyHandler {
    async fn init(
        &self,
        endpoints: Vec<ProxyEndpoint>,
        listener: Arc<dyn ConnectionListener>,
    ) -> HandlerResult<()> {
        match self.listener.write() {
            Ok(mut guard) => *guard = Some(listener),
            Err(poisoned) => *poisoned.into_inner() = Some(listener),
        }
        self.shut_down.store(false, Ordering::Release);
        for endpoint in &endpoints {
            self.proxies
                .entry(endpoint.address.clone())
                .or_insert_with(|| SimulatedProxy::new(endpoint));
        }
        tracing::debug!(proxies = endpoints.len(), "Simulated handler initialized");
        Ok(())
    }

    async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.ensure_running()?;
        self.proxies
            .entry(endpoint.address.clone())
            .or_insert_with(|| SimulatedProxy::new(&endpoint));
        Ok(())
    }

    async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.proxies.remove(&endpoint.address);
        Ok(())
    }

    fn get_proxy_states(&self) -> Vec<ProxyState> {
        let mut states: Vec<ProxyState> = self
            .proxies
            .iter()
            .map(|p| ProxyState::new(p.key().clone(), p.status, p.established))
            .collect();
        states.sort_by(|a, b| a.address.cmp(&b.address));
        states
    }

    fn is_proxy_health_ok(&self) -> bool {
        self.proxies.iter().all(|p| p.status == ProxyStatus::Ok)
    }

    async fn mark_proxies_in_error(&self) -> HandlerResult<()> {
        for mut proxy in self.proxies.iter_mut() {
            if proxy.status == ProxyStatus::Ok {
                proxy.status = ProxyStatus::Error;
                metrics::record_proxy_health(proxy.key(), false);
            }
        }
        Ok(())
    }

    async fn reset(&self) -> HandlerResult<()> {
        self.ensure_running()?;
        for mut proxy in self.proxies.iter_mut() {
            if proxy.status == ProxyStatus::Down {
                proxy.status = ProxyStatus::Error;
            }
        }
        Ok(())
    }

    async fn status(&self) -> HandlerResult<()> {
        self.ensure_running()?;
        for address in self.addresses_in(ProxyStatus::Error) {
            self.resync(&address).await;
        }
        Ok(())
    }

    async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses> {
        self.ensure_running()?;
        check_command(&command)?;
        tracing::debug!(command = %command, "Simulated send");
        Ok(self.apply_to_healthy(&command))
    }

    async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses> {
        self.ensure_running()?;
        for command in &commands {
            check_command(command)?;
        }
        let mut batch = ProxyBatchResponses::new();
        for command in &commands {
            for (proxy, response) in self.apply_to_healthy(command) {
                batch.entry(proxy).or_default().push(response);
            }
        }
        Ok(batch)
    }

    async fn shutdown(&self) -> HandlerResult<()> {
        self.shut_down.store(true, Ordering::Release);
        self.proxies.clear();
        tracing::info!("Simulated handler shut down");
        Ok(())
    }
}
