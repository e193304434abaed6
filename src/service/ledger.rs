//! Master-side dedupe of discovery events.
//!
//! # Design Decisions
//! - Keyed by `(sender, event_index)`; a retransmitted batch applies nothing
//! - An event older than one already applied for the same sender and proxy
//!   is stale and rejected, so late broadcasts never undo newer intents
//! - Per sender, everything at or below the settled floor is known applied;
//!   only indices above it are remembered individually
//! - Floors outlive missed state pulls and mastership changes: a sender is
//!   never forgotten, so a retransmission at or below its floor is always
//!   rejected. Sender identities are per coordinator instance, so the map
//!   grows by one entry per node start
//! - Non-masters adopt the floors published by the master, so a node that is
//!   elected later rejects late deliveries the old master already applied

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DiscoveryEvent, NodeId};

#[derive(Debug, Default)]
struct SenderLedger {
    floor: u64,
    applied: BTreeSet<u64>,
    latest_by_proxy: BTreeMap<String, u64>,
}

/// Which discovery events this master has already applied.
#[derive(Debug, Default)]
pub struct EventLedger {
    senders: BTreeMap<NodeId, SenderLedger>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` as applied. Returns false if it must be skipped.
    pub fn admit(&mut self, event: &DiscoveryEvent) -> bool {
        let (sender, index) = event.key();
        let ledger = self.senders.entry(sender.clone()).or_default();

        if index <= ledger.floor || ledger.applied.contains(&index) {
            return false;
        }
        if ledger
            .latest_by_proxy
            .get(&event.endpoint.address)
            .is_some_and(|&latest| latest > index)
        {
            return false;
        }

        ledger.applied.insert(index);
        ledger.latest_by_proxy.insert(event.endpoint.address.clone(), index);
        true
    }

    /// Everything from `sender` up to `up_to` is applied; forget the details.
    pub fn settle(&mut self, sender: &NodeId, up_to: u64) {
        let ledger = self.senders.entry(sender.clone()).or_default();
        if up_to <= ledger.floor {
            return;
        }
        ledger.floor = up_to;
        ledger.applied = ledger.applied.split_off(&(up_to + 1));
    }

    /// Settled floor per sender, published to peers as acknowledgements.
    pub fn acknowledged(&self) -> BTreeMap<NodeId, u64> {
        self.senders
            .iter()
            .filter(|(_, l)| l.floor > 0)
            .map(|(sender, l)| (sender.clone(), l.floor))
            .collect()
    }

    /// Raise floors to the watermarks published by a master.
    pub fn adopt_floors(&mut self, acknowledged: &BTreeMap<NodeId, u64>) {
        for (sender, &up_to) in acknowledged {
            self.settle(sender, up_to);
        }
    }

    /// Forget individually applied events above each floor, keeping the floors.
    ///
    /// Used when this node takes over as master: its handler holds none of
    /// the previous master's work, so unacknowledged events must apply again.
    pub fn restart(&mut self) {
        for ledger in self.senders.values_mut() {
            ledger.applied.clear();
            ledger.latest_by_proxy.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProxyEndpoint;

    fn event(sender: &str, address: &str, index: u64) -> DiscoveryEvent {
        DiscoveryEvent {
            sender: NodeId::new(sender),
            endpoint: ProxyEndpoint::new(address),
            addition: true,
            event_index: index,
        }
    }

    #[test]
    fn test_duplicate_delivery_is_rejected() {
        let mut ledger = EventLedger::new();
        assert!(ledger.admit(&event("a", "p:1", 1)));
        assert!(!ledger.admit(&event("a", "p:1", 1)));
        // Same index from another sender is a different event.
        assert!(ledger.admit(&event("b", "p:1", 1)));
    }

    #[test]
    fn test_out_of_order_delivery_below_floor_is_accepted() {
        let mut ledger = EventLedger::new();
        assert!(ledger.admit(&event("a", "p:2", 2)));
        assert!(ledger.admit(&event("a", "p:1", 1)));
    }

    #[test]
    fn test_stale_event_for_same_proxy_is_rejected() {
        let mut ledger = EventLedger::new();
        assert!(ledger.admit(&event("a", "p:1", 5)));
        assert!(!ledger.admit(&event("a", "p:1", 4)));
    }

    #[test]
    fn test_settle_prunes_and_publishes_floor() {
        let mut ledger = EventLedger::new();
        ledger.admit(&event("a", "p:1", 1));
        ledger.admit(&event("a", "p:2", 3));
        ledger.settle(&NodeId::new("a"), 3);

        assert!(!ledger.admit(&event("a", "p:3", 2)));
        assert_eq!(ledger.acknowledged(), BTreeMap::from([(NodeId::new("a"), 3)]));
    }

    #[test]
    fn test_settled_event_stays_rejected_after_restart() {
        let mut ledger = EventLedger::new();
        assert!(ledger.admit(&event("a", "p:1", 1)));
        ledger.settle(&NodeId::new("a"), 1);
        assert!(ledger.admit(&event("a", "p:2", 2)));

        ledger.restart();

        assert!(!ledger.admit(&event("a", "p:1", 1)));
        // Above the floor the new master applies again.
        assert!(ledger.admit(&event("a", "p:2", 2)));
        assert_eq!(ledger.acknowledged(), BTreeMap::from([(NodeId::new("a"), 1)]));
    }

    #[test]
    fn test_adopted_floors_reject_late_delivery() {
        let mut ledger = EventLedger::new();
        ledger.adopt_floors(&BTreeMap::from([(NodeId::new("a"), 4), (NodeId::new("b"), 1)]));

        assert!(!ledger.admit(&event("a", "p:1", 4)));
        assert!(!ledger.admit(&event("b", "p:1", 1)));
        assert!(ledger.admit(&event("a", "p:1", 5)));

        // Lower watermarks never move a floor back.
        ledger.adopt_floors(&BTreeMap::from([(NodeId::new("a"), 2)]));
        assert_eq!(ledger.acknowledged()[&NodeId::new("a")], 4);
    }
}
