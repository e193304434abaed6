//! Election oracle.
//!
//! # Responsibilities
//! - Answer "is this node currently the cluster master"
//!
//! # Design Decisions
//! - The oracle is sampled once per coordinator operation; callers never
//!   re-check mid-call, so a flip during an operation is simply observed on
//!   the next one
//! - `SwitchableElection` is the static policy: mastership comes from
//!   configuration and can be handed over through the admin API

use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether this node is the current master.
pub trait ElectionOracle: Send + Sync {
    fn is_master_node(&self) -> bool;
}

/// Mastership held in a flag, settable at runtime.
#[derive(Debug, Default)]
pub struct SwitchableElection {
    master: AtomicBool,
}

impl SwitchableElection {
    pub fn new(master: bool) -> Self {
        Self {
            master: AtomicBool::new(master),
        }
    }

    /// Set mastership, returning the previous value.
    pub fn set_master(&self, master: bool) -> bool {
        let previous = self.master.swap(master, Ordering::AcqRel);
        if previous != master {
            tracing::info!(master, "Mastership changed");
        }
        previous
    }
}

impl ElectionOracle for SwitchableElection {
    fn is_master_node(&self) -> bool {
        self.master.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch() {
        let election = SwitchableElection::new(false);
        assert!(!election.is_master_node());
        assert!(!election.set_master(true));
        assert!(election.is_master_node());
        assert!(election.set_master(false));
    }
}
