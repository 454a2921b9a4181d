//! Execution of an agreed read or write

use crate::common::{ActiveNodeSet, Ballot, NodeRef, OperationType, Result};
use crate::ring::rpc::{Locator, RingNode};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    /// Per-holder reply; READ carries the holder's content, WRITE carries `None`
    pub replies: Vec<(NodeRef, Option<String>)>,
    /// Holders that could not be reached or failed the operation
    pub failures: usize,
}

/// Applies a read or write once quorum and lock are secured
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn perform(
        &self,
        coordinator: &Arc<dyn RingNode>,
        ballot: &Ballot,
        active: &ActiveNodeSet,
    ) -> Result<OperationResult>;

    /// Ask the coordinator to release the read locks of every holder
    async fn release_read_locks(&self, coordinator: &Arc<dyn RingNode>, ballot: &Ballot) -> Result<()> {
        coordinator.multicast_read_release(ballot.request_id).await
    }
}

/// Default executor: contacts every holder of the file directly
pub struct FileOperation {
    locator: Arc<dyn Locator>,
}

impl FileOperation {
    pub fn new(locator: Arc<dyn Locator>) -> Self {
        Self { locator }
    }

    async fn apply(&self, member: &NodeRef, ballot: &Ballot) -> Result<Option<String>> {
        let node = self.locator.locate(member).await?;
        match ballot.operation {
            OperationType::Read => node.read_replica(ballot).await,
            OperationType::Write => node.apply_write(ballot).await.map(|_| None),
        }
    }
}

#[async_trait]
impl OperationExecutor for FileOperation {
    async fn perform(
        &self,
        _coordinator: &Arc<dyn RingNode>,
        ballot: &Ballot,
        active: &ActiveNodeSet,
    ) -> Result<OperationResult> {
        let calls = active.iter().map(|member| async move {
            (member.clone(), self.apply(member, ballot).await)
        });

        let mut result = OperationResult::default();
        for (member, reply) in join_all(calls).await {
            match reply {
                Ok(content) => result.replies.push((member, content)),
                Err(e) => {
                    tracing::warn!(
                        "{} of {} on {} failed: {}",
                        ballot.operation,
                        ballot.filename,
                        member,
                        e
                    );
                    result.failures += 1;
                }
            }
        }
        Ok(result)
    }
}
