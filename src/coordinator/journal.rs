//! Discovery-event journal.
//!
//! # Responsibilities
//! - Stamp each local topology intent with the next sequence index
//! - Keep pending intents until a master acknowledges them
//!
//! # Design Decisions
//! - Indices start at 1 and are never reused, even for dropped events
//! - One pending event per proxy address: a newer intent replaces the older.
//!   A batch naming an address twice is collapsed by the caller before
//!   recording, so N distinct endpoints always yield N events
//! - Bounded: past `capacity`, the oldest pending event is evicted
//! - Not synchronized here; the coordinator guards it with its state lock

use std::collections::VecDeque;

use crate::model::{DiscoveryEvent, NodeId, ProxyEndpoint};
use crate::observability::metrics;

/// Pending discovery events recorded by this node.
#[derive(Debug)]
pub struct DiscoveryJournal {
    sender: NodeId,
    capacity: usize,
    last_index: u64,
    events: VecDeque<DiscoveryEvent>,
}

impl DiscoveryJournal {
    pub fn new(sender: NodeId, capacity: usize) -> Self {
        Self {
            sender,
            capacity: capacity.max(1),
            last_index: 0,
            events: VecDeque::new(),
        }
    }

    /// Record a new intent and return the stamped event.
    pub fn record(&mut self, endpoint: ProxyEndpoint, addition: bool) -> DiscoveryEvent {
        self.last_index += 1;
        let event = DiscoveryEvent {
            sender: self.sender.clone(),
            endpoint,
            addition,
            event_index: self.last_index,
        };

        if let Some(pos) = self.events.iter().position(|e| e.endpoint.address == event.endpoint.address) {
            let replaced = self.events.remove(pos);
            tracing::debug!(
                proxy = %event.endpoint.address,
                replaced_index = replaced.map(|e| e.event_index),
                event_index = event.event_index,
                "Superseded pending discovery event"
            );
        }

        self.events.push_back(event.clone());

        while self.events.len() > self.capacity {
            if let Some(evicted) = self.events.pop_front() {
                tracing::warn!(
                    proxy = %evicted.endpoint.address,
                    event_index = evicted.event_index,
                    capacity = self.capacity,
                    "Discovery journal full, evicting oldest event"
                );
                metrics::record_journal_eviction();
            }
        }

        event
    }

    /// Pending events in recording order.
    pub fn pending(&self) -> Vec<DiscoveryEvent> {
        self.events.iter().cloned().collect()
    }

    /// Drop every event with `index <= up_to`. Returns how many were dropped.
    pub fn acknowledge(&mut self, up_to: u64) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.event_index > up_to);
        before - self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
