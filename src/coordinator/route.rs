//! Per-call routing of proxy operations.
//!
//! The coordinator picks one [`ProxyRoute`] per call from the election
//! oracle: [`LocalRoute`] on the master, [`BroadcastRoute`] everywhere else.

use std::collections::HashSet;
use std::sync::Arc;
use async_trait::async_trait;

use crate::cluster::rpc::{
    fan_out, first_present, ClusterRpc, DiscoveryEventCall, IsProxyHealthOkCall,
    MarkProxiesInErrorCall, ResetCall, SendRequestCall, SendRequestsCall,
};
use crate::coordinator::CoordinatorState;
use crate::handler::{ConnectionListener, HandlerResult, ProxyHandler};
use crate::model::{DiscoveryEvent, ProxyBatchResponses, ProxyCommand, ProxyEndpoint, ProxyResponses};
use crate::observability::metrics;

/// One implementation of every mastership-dependent operation.
#[async_trait]
pub(crate) trait ProxyRoute: Send + Sync {
    async fn init(&self, endpoints: Vec<ProxyEndpoint>, listener: Arc<dyn ConnectionListener>) -> HandlerResult<()>;

    async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()>;

    async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()>;

    async fn is_proxy_health_ok(&self) -> bool;

    async fn mark_proxies_in_error(&self) -> HandlerResult<()>;

    async fn reset(&self) -> HandlerResult<()>;

    async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses>;

    async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses>;
}

/// Master: act on the proxies directly.
pub(crate) struct LocalRoute {
    pub(crate) handler: Arc<dyn ProxyHandler>,
}

#[async_trait]
impl ProxyRoute for LocalRoute {
    async fn init(&self, endpoints: Vec<ProxyEndpoint>, listener: Arc<dyn ConnectionListener>) -> HandlerResult<()> {
        self.handler.init(endpoints, listener).await
    }

    async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.handler.add_proxy(endpoint).await
    }

    async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.handler.remove_proxy(endpoint).await
    }

    async fn is_proxy_health_ok(&self) -> bool {
        self.handler.is_proxy_health_ok()
    }

    async fn mark_proxies_in_error(&self) -> HandlerResult<()> {
        self.handler.mark_proxies_in_error().await
    }

    async fn reset(&self) -> HandlerResult<()> {
        self.handler.reset().await
    }

    async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses> {
        self.handler.send_request(command).await
    }

    async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses> {
        self.handler.send_requests(commands).await
    }
}

/// Non-master: journal topology intents and forward the rest to the master.
pub(crate) struct BroadcastRoute {
    pub(crate) handler: Arc<dyn ProxyHandler>,
    pub(crate) rpc: Arc<dyn ClusterRpc>,
    pub(crate) state: Arc<CoordinatorState>,
}

impl BroadcastRoute {
    /// Journal the intents and broadcast them as one batch.
    async fn publish(&self, intents: Vec<(ProxyEndpoint, bool)>) {
        if intents.is_empty() {
            return;
        }

        let events: Vec<DiscoveryEvent> = {
            let mut guard = self.state.lock();
            intents
                .into_iter()
                .map(|(endpoint, addition)| guard.journal.record(endpoint, addition))
                .collect()
        };

        for event in &events {
            metrics::record_discovery_event(if event.addition { "add" } else { "remove" });
            tracing::debug!(
                proxy = %event.endpoint.address,
                addition = event.addition,
                event_index = event.event_index,
                "Journaled discovery event"
            );
        }

        fan_out(self.rpc.as_ref(), DiscoveryEventCall(events)).await;
    }
}

#[async_trait]
impl ProxyRoute for BroadcastRoute {
    async fn init(&self, endpoints: Vec<ProxyEndpoint>, listener: Arc<dyn ConnectionListener>) -> HandlerResult<()> {
        self.handler.init(Vec::new(), listener).await?;

        let mut seen = HashSet::new();
        let intents = endpoints
            .into_iter()
            .filter(|e| seen.insert(e.address.clone()))
            .map(|e| (e, true))
            .collect();
        self.publish(intents).await;
        Ok(())
    }

    async fn add_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.publish(vec![(endpoint, true)]).await;
        Ok(())
    }

    async fn remove_proxy(&self, endpoint: ProxyEndpoint) -> HandlerResult<()> {
        self.publish(vec![(endpoint, false)]).await;
        Ok(())
    }

    async fn is_proxy_health_ok(&self) -> bool {
        let healthy = first_present(fan_out(self.rpc.as_ref(), IsProxyHealthOkCall).await);
        if healthy.is_none() {
            tracing::debug!("No member answered the health query");
        }
        healthy.unwrap_or(false)
    }

    async fn mark_proxies_in_error(&self) -> HandlerResult<()> {
        fan_out(self.rpc.as_ref(), MarkProxiesInErrorCall).await;
        Ok(())
    }

    async fn reset(&self) -> HandlerResult<()> {
        fan_out(self.rpc.as_ref(), ResetCall).await;
        Ok(())
    }

    async fn send_request(&self, command: ProxyCommand) -> HandlerResult<ProxyResponses> {
        let replies = fan_out(self.rpc.as_ref(), SendRequestCall(command)).await;
        Ok(first_present(replies).unwrap_or_default())
    }

    async fn send_requests(&self, commands: Vec<ProxyCommand>) -> HandlerResult<ProxyBatchResponses> {
        let replies = fan_out(self.rpc.as_ref(), SendRequestsCall(commands)).await;
        Ok(first_present(replies).unwrap_or_default())
    }
}
