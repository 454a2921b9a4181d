//! Per-node vote and critical-section table
//!
//! Every entry is keyed by request id so concurrent requests never share a
//! tally or a lock flag. Votes are granted under a reader-writer rule: any
//! number of READ requests may hold a vote at once, a WRITE needs the node to
//! itself. Incompatible requests are denied rather than queued.

use crate::common::{ActiveNodeSet, Ballot, OperationType};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct VoteTable {
    clock: u64,
    grants: HashMap<Uuid, OperationType>,
    critical_section: Option<(Uuid, OperationType)>,
    active_views: HashMap<Uuid, ActiveNodeSet>,
    decisions: HashMap<Uuid, bool>,
}

impl VoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Advance the logical clock for a local event
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Merge a remote clock (Lamport receive rule)
    pub fn observe(&mut self, remote: u64) -> u64 {
        self.clock = self.clock.max(remote) + 1;
        self.clock
    }

    pub fn set_active_view(&mut self, request_id: Uuid, nodes: ActiveNodeSet) {
        self.active_views.insert(request_id, nodes);
    }

    pub fn active_view(&self, request_id: &Uuid) -> Option<&ActiveNodeSet> {
        self.active_views.get(request_id)
    }

    pub fn vote(&mut self, ballot: &Ballot) -> bool {
        self.observe(ballot.clock);

        if self.grants.contains_key(&ballot.request_id) {
            return true;
        }

        let in_section = self
            .critical_section
            .as_ref()
            .filter(|(id, _)| *id != ballot.request_id);

        let compatible = match ballot.operation {
            OperationType::Read => {
                self.grants.values().all(|op| *op == OperationType::Read)
                    && !matches!(in_section, Some((_, OperationType::Write)))
            }
            OperationType::Write => self.grants.is_empty() && in_section.is_none(),
        };

        if compatible {
            self.grants.insert(ballot.request_id, ballot.operation);
        }
        compatible
    }

    /// Store the final decision. A negative decision drops this node's vote.
    /// Returns true when the decision is positive and this node still holds its vote.
    pub fn record_decision(&mut self, ballot: &Ballot) -> bool {
        self.observe(ballot.clock);
        self.decisions.insert(ballot.request_id, ballot.acknowledged);

        if !ballot.acknowledged {
            self.grants.remove(&ballot.request_id);
            return false;
        }
        self.grants.contains_key(&ballot.request_id)
    }

    pub fn decision(&self, request_id: &Uuid) -> Option<bool> {
        self.decisions.get(request_id).copied()
    }

    /// Enter the critical section for the request; returns the new clock
    pub fn acquire(&mut self, ballot: &Ballot) -> u64 {
        self.critical_section = Some((ballot.request_id, ballot.operation));
        self.tick()
    }

    pub fn in_critical_section(&self, request_id: &Uuid) -> bool {
        matches!(&self.critical_section, Some((id, _)) if id == request_id)
    }

    pub fn holds_vote(&self, request_id: &Uuid) -> bool {
        self.grants.contains_key(request_id)
    }

    /// Drop everything the request holds on this node
    pub fn release(&mut self, request_id: &Uuid) {
        self.grants.remove(request_id);
        self.active_views.remove(request_id);
        self.decisions.remove(request_id);
        if self.in_critical_section(request_id) {
            self.critical_section = None;
        }
    }

    pub fn release_read(&mut self, request_id: &Uuid) {
        if self.grants.get(request_id) == Some(&OperationType::Read) {
            self.grants.remove(request_id);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.grants.is_empty() && self.critical_section.is_none()
    }
}
