//! Data model shared by ring nodes and the replica protocol

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Ring key of one replica of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(pub u64);

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identity of a ring participant. Equality, ordering and hashing use `node_id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    pub node_id: u64,
    pub address: String,
}

impl NodeRef {
    /// Node reference whose id is the ring hash of its address
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            node_id: crate::common::hash_of(&address),
            address,
        }
    }

    pub fn with_id(node_id: u64, address: impl Into<String>) -> Self {
        Self {
            node_id,
            address: address.into(),
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node_id.hash(state);
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.node_id.cmp(&other.node_id)
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:016x}", self.address, self.node_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Read,
    Write,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Read => write!(f, "read"),
            OperationType::Write => write!(f, "write"),
        }
    }
}

/// Request envelope for one quorum read or write.
///
/// Ballots are values: protocol steps build an updated copy and send that,
/// they never mutate a ballot another party holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub request_id: Uuid,
    pub operation: OperationType,
    pub origin: NodeRef,
    pub filename: String,
    pub replica_ids: Vec<ReplicaId>,
    /// Origin's logical clock when the vote was requested
    pub clock: u64,
    pub acknowledged: bool,
    pub payload: Option<String>,
}

impl Ballot {
    pub fn new(
        operation: OperationType,
        origin: NodeRef,
        filename: impl Into<String>,
        replica_ids: Vec<ReplicaId>,
        payload: Option<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            operation,
            origin,
            filename: filename.into(),
            replica_ids,
            clock: 0,
            acknowledged: false,
            payload,
        }
    }

    pub fn stamped(&self, clock: u64) -> Self {
        Self {
            clock,
            ..self.clone()
        }
    }

    pub fn with_decision(&self, acknowledged: bool) -> Self {
        Self {
            acknowledged,
            ..self.clone()
        }
    }

    /// Payload tagged with this ballot's clock and origin
    pub fn versioned_payload(&self) -> Option<VersionedContent> {
        self.payload.as_ref().map(|content| VersionedContent {
            version: ContentVersion {
                clock: self.clock,
                origin: self.origin.node_id,
            },
            content: content.clone(),
        })
    }
}

/// Current holders of a file's replicas, at most one entry per node identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<NodeRef>", into = "Vec<NodeRef>")]
pub struct ActiveNodeSet {
    nodes: BTreeMap<u64, NodeRef>,
}

impl ActiveNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a holder; returns false when a node with the same identity is already present.
    pub fn insert(&mut self, node: NodeRef) -> bool {
        if self.nodes.contains_key(&node.node_id) {
            return false;
        }
        self.nodes.insert(node.node_id, node);
        true
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.contains_key(&node.node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
        self.nodes.values()
    }

    pub fn get(&self, index: usize) -> Option<&NodeRef> {
        self.nodes.values().nth(index)
    }
}

impl From<Vec<NodeRef>> for ActiveNodeSet {
    fn from(nodes: Vec<NodeRef>) -> Self {
        let mut set = ActiveNodeSet::new();
        for node in nodes {
            set.insert(node);
        }
        set
    }
}

impl From<ActiveNodeSet> for Vec<NodeRef> {
    fn from(set: ActiveNodeSet) -> Self {
        set.nodes.into_values().collect()
    }
}

impl FromIterator<NodeRef> for ActiveNodeSet {
    fn from_iter<I: IntoIterator<Item = NodeRef>>(iter: I) -> Self {
        let mut set = ActiveNodeSet::new();
        for node in iter {
            set.insert(node);
        }
        set
    }
}

/// Identity of the node that seeded a replica, persisted at the holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedReplicaRecord {
    pub owner_ip: String,
    pub owner_id: u64,
}

impl From<&NodeRef> for PersistedReplicaRecord {
    fn from(node: &NodeRef) -> Self {
        Self {
            owner_ip: node.address.clone(),
            owner_id: node.node_id,
        }
    }
}

/// Metadata-map entry of a holder node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    pub replica_id: ReplicaId,
    pub holder: NodeRef,
    pub seeded_by: PersistedReplicaRecord,
}

/// Order of written contents: origin clock first, origin node id breaks ties
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ContentVersion {
    pub clock: u64,
    pub origin: u64,
}

/// File content tagged with the write that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedContent {
    pub version: ContentVersion,
    pub content: String,
}

/// What the distributor pushes to a replica's successor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSeed {
    pub owner: PersistedReplicaRecord,
    pub content: Option<VersionedContent>,
}

/// Entry of a node's distribution working set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub filename: String,
    /// Latest content this node wrote or learned for the file
    pub content: Option<VersionedContent>,
}

/// Request-scoped vote count over the active set discovered for that request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub active: usize,
    pub acks: usize,
}

impl Tally {
    pub fn new(active: usize) -> Self {
        Self { active, acks: 0 }
    }

    pub fn record(&mut self, acknowledged: bool) {
        if acknowledged {
            self.acks += 1;
        }
    }

    /// `acks > floor(active / 2)`
    pub fn majority_acknowledged(&self) -> bool {
        self.acks > self.active / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ref_identity() {
        let a = NodeRef::with_id(7, "process1:9091");
        let b = NodeRef::with_id(7, "10.0.0.1:9091");
        let c = NodeRef::with_id(8, "process1:9091");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_node_ref_hashes_address() {
        let node = NodeRef::new("process1");
        assert_eq!(node.node_id, crate::common::hash_of("process1"));
    }

    #[test]
    fn test_active_set_dedup() {
        let mut set = ActiveNodeSet::new();
        assert!(set.insert(NodeRef::with_id(1, "a")));
        assert!(set.insert(NodeRef::with_id(2, "b")));
        assert!(!set.insert(NodeRef::with_id(1, "a-again")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().address, "a");
    }

    #[test]
    fn test_active_set_serde() {
        let set: ActiveNodeSet = vec![NodeRef::with_id(2, "b"), NodeRef::with_id(1, "a")].into();
        let json = serde_json::to_string(&set).unwrap();
        let back: ActiveNodeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert_eq!(back.get(0).unwrap().node_id, 1);
    }

    #[test]
    fn test_ballot_copies() {
        let ballot = Ballot::new(
            OperationType::Write,
            NodeRef::with_id(1, "a"),
            "doc.txt",
            vec![ReplicaId(5)],
            Some("hello".into()),
        );
        let decided = ballot.stamped(3).with_decision(true);
        assert!(!ballot.acknowledged);
        assert_eq!(ballot.clock, 0);
        assert!(decided.acknowledged);
        assert_eq!(decided.clock, 3);
        assert_eq!(decided.request_id, ballot.request_id);
    }

    #[test]
    fn test_versioned_payload_orders_by_clock_then_origin() {
        let early = Ballot::new(
            OperationType::Write,
            NodeRef::with_id(9, "b"),
            "doc.txt",
            vec![],
            Some("old".into()),
        )
        .stamped(4);
        let late = Ballot::new(
            OperationType::Write,
            NodeRef::with_id(1, "a"),
            "doc.txt",
            vec![],
            Some("new".into()),
        )
        .stamped(5);

        let early = early.versioned_payload().unwrap();
        let late = late.versioned_payload().unwrap();
        assert!(late.version > early.version);
        assert!(
            ContentVersion { clock: 5, origin: 2 } > ContentVersion { clock: 5, origin: 1 }
        );
        assert!(Ballot::new(OperationType::Read, NodeRef::with_id(1, "a"), "f", vec![], None)
            .versioned_payload()
            .is_none());
    }

    #[test]
    fn test_majority_law() {
        for active in 0..8usize {
            for acks in 0..=active {
                let tally = Tally { active, acks };
                assert_eq!(tally.majority_acknowledged(), acks > active / 2);
            }
        }
    }

    #[test]
    fn test_majority_three_holders() {
        let mut tally = Tally::new(3);
        tally.record(true);
        assert!(!tally.majority_acknowledged());
        tally.record(false);
        tally.record(true);
        assert!(tally.majority_acknowledged());
    }

    #[test]
    fn test_replica_id_display() {
        assert_eq!(ReplicaId(255).to_string(), "00000000000000ff");
    }
}
