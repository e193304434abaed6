//! Periodic status cycle and election policy.
//!
//! # Cycle
//! ```text
//! 1. read load
//! 2. mastership transition?  became → stop old master, adopt cluster view, mark in error
//!                            lost   → shut the local handler down
//! 3. reset necessary?        initiated → local reset requests via coordinator → completed
//! 4. master only:            pull peer state → apply discovery events → handler.status
//!                            → send STATUS requests → publish ClusterStatusComplete
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;

use crate::cluster::rpc::{fan_out, notify, GetClusterCoordinatorStateCall};
use crate::cluster::{ClusterRequest, ClusterStatusComplete, PeerCoordinatorState};
use crate::model::{PeerContextMap, ProxyState, ProxyStatus};
use crate::observability::metrics;
use crate::reset::ResetRequestSource;
use crate::service::ProxyService;

impl ProxyService {
    /// Run the status cycle until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let interval = Duration::from_secs(self.config.load().cluster.status_interval_secs.max(1));
        tracing::info!(node = %self.node_id, interval_secs = interval.as_secs(), "Status cycle starting");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.status_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Status cycle received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One pass of the status cycle.
    pub async fn status_cycle(&self) {
        let started = Instant::now();
        let load = self.load.load();

        let master = self.is_master();
        let was_master = self.was_master.swap(master, Ordering::AcqRel);
        metrics::record_master(master);
        match (was_master, master) {
            (false, true) => self.became_master().await,
            (true, false) => self.lost_master().await,
            _ => {}
        }

        self.run_reset_if_necessary().await;

        if master {
            self.master_status(load).await;
        }

        metrics::record_status_cycle(started.elapsed());
    }

    async fn run_reset_if_necessary(&self) {
        if !self.coordinator.is_reset_necessary() {
            return;
        }

        self.coordinator.reset_initiated();
        let requests = self.reset_requests.get_local_reset_requests(&PeerContextMap::new());
        tracing::info!(node = %self.node_id, requests = requests.len(), "Reset cycle initiated");

        if !requests.is_empty() {
            if let Err(e) = self.coordinator.send_requests(requests).await {
                tracing::warn!(error = %e, "Failed to send reset requests");
            }
        }
        self.coordinator.reset_completed();
    }

    async fn became_master(&self) {
        tracing::info!(node = %self.node_id, "Became master node");
        notify(self.rpc.as_ref(), ClusterRequest::StopOldMaster);

        // Unacknowledged events are applied again; settled floors still hold.
        self.ledger().restart();

        // A previous demotion may have shut the handler down.
        if let Err(e) = self.coordinator.handler().init(Vec::new(), self.listener.clone()).await {
            tracing::error!(error = %e, "Failed to reopen local proxy handler");
            return;
        }

        let peers = self.gather_peer_state().await;
        let configured = self.config.load().proxies.addresses.clone();

        let mut authoritative: BTreeMap<String, ProxyState> = BTreeMap::new();
        for state in self
            .replicated_view()
            .into_iter()
            .chain(peers.iter().flat_map(|p| p.proxies.iter().cloned()))
        {
            authoritative.entry(state.address.clone()).or_insert(state);
        }
        for address in configured {
            authoritative
                .entry(address.clone())
                .or_insert_with(|| ProxyState::new(address, ProxyStatus::Error, false));
        }

        let authoritative: Vec<ProxyState> = authoritative.into_values().collect();
        match self.coordinator.update_servers_from_master_node(&authoritative).await {
            Ok(states) => {
                tracing::info!(proxies = states.len(), "Adopted cluster proxy view");
                self.store_replicated(states);
            }
            Err(e) => tracing::error!(error = %e, "Failed to adopt cluster proxy view"),
        }

        if let Err(e) = self.coordinator.mark_proxies_in_error().await {
            tracing::warn!(error = %e, "Failed to mark proxies in error after election");
        }
    }

    async fn lost_master(&self) {
        tracing::info!(node = %self.node_id, "No longer master node");
        if let Err(e) = self.coordinator.shutdown().await {
            tracing::warn!(error = %e, "Failed to shut down local proxy handler");
        }
    }

    async fn gather_peer_state(&self) -> Vec<PeerCoordinatorState> {
        let states = self.coordinator.get_proxy_states();
        fan_out(self.rpc.as_ref(), GetClusterCoordinatorStateCall(states))
            .await
            .into_iter()
            .filter_map(|reply| reply.result)
            .collect()
    }

    async fn master_status(&self, load: u8) {
        let handler = self.coordinator.handler();
        let peers = self.gather_peer_state().await;

        // Own journal first: entries recorded while this node was not master.
        let own = self.coordinator.get_pending_discovery_events();
        let own_max = own.iter().map(|e| e.event_index).max();
        let mut applied = self.apply_discovery_events(own).await;
        if let Some(up_to) = own_max {
            self.ledger().settle(&self.node_id, up_to);
            self.coordinator.acknowledge_discovery_events(up_to);
        }

        let mut requests = self.status_requests(load);
        let members = peers.len() + 1;
        for peer in peers {
            let peer_max = peer.pending_events.iter().map(|e| e.event_index).max();
            applied += self.apply_discovery_events(peer.pending_events).await;
            if let Some(up_to) = peer_max {
                self.ledger().settle(&peer.node, up_to);
            }
            requests.extend(peer.requests);
        }

        // Proxies added above are resynced in this same pass.
        if let Err(e) = handler.status().await {
            tracing::warn!(error = %e, "Local proxy status refresh failed");
        }

        if !requests.is_empty() {
            if let Err(e) = handler.send_requests(requests).await {
                tracing::warn!(error = %e, "Failed to send status requests");
            }
        }

        let proxies = handler.get_proxy_states();
        for proxy in &proxies {
            metrics::record_proxy_health(&proxy.address, proxy.is_ok());
        }
        self.store_replicated(proxies.clone());

        let complete = ClusterStatusComplete {
            proxies,
            acknowledged: self.acknowledged(),
        };
        tracing::debug!(
            applied_events = applied,
            members,
            "Status cycle complete"
        );
        notify(self.rpc.as_ref(), ClusterRequest::ClusterStatusComplete(complete));
    }
}
