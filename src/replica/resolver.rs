//! Active node resolution

use crate::common::{ActiveNodeSet, ReplicaId, ReplicaRecord, Result};
use crate::replica::keys::ReplicaKeyGenerator;
use crate::ring::rpc::{Locator, RingNode};
use std::collections::HashMap;
use std::sync::Arc;

/// Finds the nodes currently holding the replicas of a file
pub struct ActiveNodeResolver {
    node: Arc<dyn RingNode>,
    locator: Arc<dyn Locator>,
    keys: ReplicaKeyGenerator,
}

impl ActiveNodeResolver {
    pub fn new(node: Arc<dyn RingNode>, locator: Arc<dyn Locator>, keys: ReplicaKeyGenerator) -> Self {
        Self { node, locator, keys }
    }

    pub fn keys(&self) -> &ReplicaKeyGenerator {
        &self.keys
    }

    /// Current holder set of `filename`, one entry per node.
    ///
    /// An empty set means no replica is resolvable right now; it is not an error.
    pub async fn resolve(&self, filename: &str) -> Result<ActiveNodeSet> {
        let mut active = ActiveNodeSet::new();
        // Several replica keys often land on the same successor
        let mut fetched: HashMap<u64, HashMap<ReplicaId, ReplicaRecord>> = HashMap::new();

        for id in self.keys.generate(filename) {
            let Some(successor) = self.node.find_successor(id).await? else {
                continue;
            };

            if !fetched.contains_key(&successor.node_id) {
                let holder = self.locator.locate(&successor).await?;
                fetched.insert(successor.node_id, holder.metadata().await?);
            }

            if let Some(record) = fetched.get(&successor.node_id).and_then(|m| m.get(&id)) {
                active.insert(record.holder.clone());
            }
        }

        tracing::debug!("Resolved {} active nodes for {}", active.len(), filename);
        Ok(active)
    }
}
