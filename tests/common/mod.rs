//! In-process ring fixtures shared by the integration tests

#![allow(dead_code)]

use chordfs::common::NodeRef;
use chordfs::replica::{QuorumCoordinator, ReplicaDistributor, ReplicaKeyGenerator};
use chordfs::ring::{LocalNode, MemoryNetwork, StaticRing, Topology};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Ring {
    pub dir: TempDir,
    pub network: Arc<MemoryNetwork>,
    pub topology: Arc<StaticRing>,
    pub nodes: Vec<Arc<LocalNode>>,
}

impl Ring {
    pub async fn new(addresses: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let network = MemoryNetwork::new();
        let topology = Arc::new(StaticRing::new(addresses.iter().map(|a| NodeRef::new(*a))));

        let mut ring = Self {
            dir,
            network,
            topology,
            nodes: Vec::new(),
        };
        for address in addresses {
            let node = ring.open_node(address).await;
            ring.nodes.push(node);
        }
        ring
    }

    /// Open (or reopen) a node on the shared data dir and register it
    pub async fn open_node(&self, address: &str) -> Arc<LocalNode> {
        let node = Arc::new(
            LocalNode::open(
                NodeRef::new(address),
                self.dir.path(),
                self.topology.clone(),
                self.network.clone(),
            )
            .await
            .unwrap(),
        );
        self.network.register(&node).await;
        node
    }

    pub fn distributor(&self, issuer: usize, replicas: usize) -> Arc<ReplicaDistributor> {
        Arc::new(ReplicaDistributor::new(
            self.nodes[issuer].clone(),
            self.network.clone(),
            ReplicaKeyGenerator::new(replicas).unwrap(),
            Duration::from_millis(20),
        )
        .unwrap())
    }

    pub fn coordinator(&self, distributor: Arc<ReplicaDistributor>, issuer: usize) -> QuorumCoordinator {
        QuorumCoordinator::new(self.nodes[issuer].clone(), self.network.clone(), distributor)
    }

    /// Distinct successors of the replica keys of `filename`
    pub async fn successors(&self, filename: &str, replicas: usize) -> BTreeSet<u64> {
        let keys = ReplicaKeyGenerator::new(replicas).unwrap();
        let mut holders = BTreeSet::new();
        for id in keys.generate(filename) {
            holders.insert(self.topology.successor(id).await.unwrap().node_id);
        }
        holders
    }

    /// A file name whose replica keys land on every node of the ring
    pub async fn spread_file(&self, replicas: usize) -> String {
        for i in 0..1000 {
            let filename = format!("file-{}.txt", i);
            if self.successors(&filename, replicas).await.len() == self.nodes.len() {
                return filename;
            }
        }
        panic!("no file name spreads over all {} nodes", self.nodes.len());
    }

    pub fn node(&self, node_id: u64) -> &Arc<LocalNode> {
        self.nodes
            .iter()
            .find(|n| n.node_ref().node_id == node_id)
            .unwrap()
    }

    pub async fn all_idle(&self) -> bool {
        for node in &self.nodes {
            if !node.is_idle().await {
                return false;
            }
        }
        true
    }
}

pub const THREE: [&str; 3] = ["process1:9091", "process2:9091", "process3:9091"];
