//! In-process locator: a registry of local nodes
//!
//! Used to run whole rings inside one process (tests, simulations). Nodes can
//! be disconnected to make them unreachable without dropping their state.

use crate::common::{Error, NodeRef, Result};
use crate::ring::node::LocalNode;
use crate::ring::rpc::{Locator, RingNode};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryNetwork {
    nodes: RwLock<HashMap<u64, Weak<dyn RingNode>>>,
    disconnected: RwLock<HashSet<u64>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register(&self, node: &Arc<LocalNode>) {
        let weak: Weak<dyn RingNode> = Arc::downgrade(node) as Weak<dyn RingNode>;
        self.nodes.write().await.insert(node.node_ref().node_id, weak);
    }

    pub async fn disconnect(&self, node_id: u64) {
        self.disconnected.write().await.insert(node_id);
    }

    pub async fn reconnect(&self, node_id: u64) {
        self.disconnected.write().await.remove(&node_id);
    }
}

#[async_trait]
impl Locator for MemoryNetwork {
    async fn locate(&self, node: &NodeRef) -> Result<Arc<dyn RingNode>> {
        if self.disconnected.read().await.contains(&node.node_id) {
            return Err(Error::Transport(format!("node {} is unreachable", node)));
        }

        self.nodes
            .read()
            .await
            .get(&node.node_id)
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::Transport(format!("node {} is not registered", node)))
    }
}
