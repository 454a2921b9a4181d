//! Ring topology: successor resolution over the identifier ring
//!
//! Full Chord maintenance (finger tables, stabilisation) lives outside this
//! crate. `StaticRing` resolves successors over a known membership list, the
//! way a static tracker of active nodes would.

use crate::common::{NodeRef, ReplicaId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait Topology: Send + Sync {
    /// First member whose id is >= `id`, wrapping around the ring
    async fn successor(&self, id: ReplicaId) -> Option<NodeRef>;

    async fn members(&self) -> Vec<NodeRef>;
}

/// Successor lookup over a fixed (but editable) membership list
#[derive(Debug, Default)]
pub struct StaticRing {
    members: RwLock<BTreeMap<u64, NodeRef>>,
}

impl StaticRing {
    pub fn new(members: impl IntoIterator<Item = NodeRef>) -> Self {
        let members = members
            .into_iter()
            .map(|node| (node.node_id, node))
            .collect();
        Self {
            members: RwLock::new(members),
        }
    }

    pub fn from_addresses(addresses: &[String]) -> Self {
        Self::new(addresses.iter().map(NodeRef::new))
    }

    /// Add a member; returns false if its id is already on the ring
    pub async fn join(&self, node: NodeRef) -> bool {
        let mut members = self.members.write().await;
        if members.contains_key(&node.node_id) {
            return false;
        }
        tracing::info!("Node {} joined the ring", node);
        members.insert(node.node_id, node);
        true
    }

    pub async fn leave(&self, node_id: u64) -> Option<NodeRef> {
        let removed = self.members.write().await.remove(&node_id);
        if let Some(node) = &removed {
            tracing::info!("Node {} left the ring", node);
        }
        removed
    }
}

#[async_trait]
impl Topology for StaticRing {
    async fn successor(&self, id: ReplicaId) -> Option<NodeRef> {
        let members = self.members.read().await;
        members
            .range(id.0..)
            .next()
            .or_else(|| members.iter().next())
            .map(|(_, node)| node.clone())
    }

    async fn members(&self) -> Vec<NodeRef> {
        self.members.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> StaticRing {
        StaticRing::new(vec![
            NodeRef::with_id(100, "a"),
            NodeRef::with_id(200, "b"),
            NodeRef::with_id(300, "c"),
        ])
    }

    #[tokio::test]
    async fn test_successor_exact_and_between() {
        let ring = ring();
        assert_eq!(ring.successor(ReplicaId(100)).await.unwrap().address, "a");
        assert_eq!(ring.successor(ReplicaId(150)).await.unwrap().address, "b");
        assert_eq!(ring.successor(ReplicaId(0)).await.unwrap().address, "a");
    }

    #[tokio::test]
    async fn test_successor_wraps() {
        let ring = ring();
        assert_eq!(ring.successor(ReplicaId(301)).await.unwrap().address, "a");
        assert_eq!(
            ring.successor(ReplicaId(u64::MAX)).await.unwrap().address,
            "a"
        );
    }

    #[tokio::test]
    async fn test_empty_ring() {
        let ring = StaticRing::default();
        assert!(ring.successor(ReplicaId(42)).await.is_none());
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let ring = ring();
        assert!(ring.join(NodeRef::with_id(250, "d")).await);
        assert!(!ring.join(NodeRef::with_id(250, "d")).await);
        assert_eq!(ring.successor(ReplicaId(220)).await.unwrap().address, "d");

        assert!(ring.leave(250).await.is_some());
        assert_eq!(ring.successor(ReplicaId(220)).await.unwrap().address, "c");
        assert_eq!(ring.members().await.len(), 3);
    }
}
