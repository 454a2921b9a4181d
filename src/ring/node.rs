//! In-process ring node
//!
//! Owns the replica store and the vote table of one participant and answers
//! every `RingNode` call locally. When it acts as the coordinator of a request
//! it reaches the other holders through its `Locator`.

use crate::common::{
    ActiveNodeSet, Ballot, Error, NodeRef, OperationType, ReplicaId, ReplicaRecord, ReplicaSeed,
    Result, Tally, TrackedFile, VersionedContent,
};
use crate::ring::rpc::{Locator, RingNode};
use crate::ring::store::ReplicaStore;
use crate::ring::topology::Topology;
use crate::ring::votes::VoteTable;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct LocalNode {
    identity: NodeRef,
    topology: Arc<dyn Topology>,
    locator: Arc<dyn Locator>,
    store: ReplicaStore,
    votes: Mutex<VoteTable>,
}

impl LocalNode {
    pub async fn open(
        identity: NodeRef,
        data_dir: impl AsRef<Path>,
        topology: Arc<dyn Topology>,
        locator: Arc<dyn Locator>,
    ) -> Result<Self> {
        let store = ReplicaStore::open(data_dir, identity.clone()).await?;
        Ok(Self {
            identity,
            topology,
            locator,
            store,
            votes: Mutex::new(VoteTable::new()),
        })
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.identity
    }

    pub fn store(&self) -> &ReplicaStore {
        &self.store
    }

    pub fn locator(&self) -> Arc<dyn Locator> {
        self.locator.clone()
    }

    pub async fn clock(&self) -> u64 {
        self.votes.lock().await.clock()
    }

    pub async fn holds_vote(&self, request_id: &Uuid) -> bool {
        self.votes.lock().await.holds_vote(request_id)
    }

    pub async fn decision(&self, request_id: &Uuid) -> Option<bool> {
        self.votes.lock().await.decision(request_id)
    }

    /// No votes granted and no critical section held
    pub async fn is_idle(&self) -> bool {
        self.votes.lock().await.is_idle()
    }

    async fn active_view(&self, request_id: &Uuid) -> Option<ActiveNodeSet> {
        self.votes.lock().await.active_view(request_id).cloned()
    }

    /// Poll every holder registered for the request and fold the votes
    async fn collect_votes(&self, ballot: &Ballot, expected: OperationType) -> Result<bool> {
        if ballot.operation != expected {
            return Err(Error::Other(format!(
                "{} ballot sent to {} vote request",
                ballot.operation, expected
            )));
        }

        let Some(view) = self.active_view(&ballot.request_id).await else {
            tracing::warn!(
                "No active node view for request {}, denying",
                ballot.request_id
            );
            return Ok(false);
        };

        let polls = view.iter().map(|member| async move {
            let vote = match self.locator.locate(member).await {
                Ok(node) => node.vote(ballot).await,
                Err(e) => Err(e),
            };
            match vote {
                Ok(granted) => granted,
                Err(e) => {
                    tracing::warn!("Vote from {} failed: {}", member, e);
                    false
                }
            }
        });

        let mut tally = Tally::new(view.len());
        for granted in join_all(polls).await {
            tally.record(granted);
        }

        tracing::debug!(
            "Request {} ({}): {}/{} votes",
            ballot.request_id,
            ballot.operation,
            tally.acks,
            tally.active
        );
        Ok(tally.majority_acknowledged())
    }
}

#[async_trait]
impl RingNode for LocalNode {
    async fn identity(&self) -> Result<NodeRef> {
        Ok(self.identity.clone())
    }

    async fn tick(&self) -> Result<u64> {
        Ok(self.votes.lock().await.tick())
    }

    async fn find_successor(&self, id: ReplicaId) -> Result<Option<NodeRef>> {
        Ok(self.topology.successor(id).await)
    }

    async fn add_to_file_key(&self, id: ReplicaId) -> Result<()> {
        self.store.add_file_key(id).await;
        Ok(())
    }

    async fn create_local_record(&self, seed: ReplicaSeed, id: ReplicaId) -> Result<()> {
        if self.store.record_seed(id, &seed).await? {
            tracing::debug!(
                "Node {} now holds replica {} seeded by {}",
                self.identity,
                id,
                seed.owner.owner_ip
            );
        }
        Ok(())
    }

    async fn metadata(&self) -> Result<HashMap<ReplicaId, ReplicaRecord>> {
        Ok(self.store.metadata().await)
    }

    async fn track_file(&self, filename: String, content: Option<VersionedContent>) -> Result<()> {
        self.store.track(&filename, content).await
    }

    async fn tracked_files(&self) -> Result<Vec<TrackedFile>> {
        Ok(self.store.tracked().await)
    }

    async fn set_active_nodes(&self, request_id: Uuid, nodes: ActiveNodeSet) -> Result<()> {
        self.votes.lock().await.set_active_view(request_id, nodes);
        Ok(())
    }

    async fn request_read_operation(&self, ballot: &Ballot) -> Result<bool> {
        self.collect_votes(ballot, OperationType::Read).await
    }

    async fn request_write_operation(&self, ballot: &Ballot) -> Result<bool> {
        self.collect_votes(ballot, OperationType::Write).await
    }

    async fn vote(&self, ballot: &Ballot) -> Result<bool> {
        Ok(self.votes.lock().await.vote(ballot))
    }

    async fn record_decision(&self, ballot: &Ballot) -> Result<bool> {
        Ok(self.votes.lock().await.record_decision(ballot))
    }

    async fn acquire_lock(&self, ballot: &Ballot) -> Result<()> {
        let clock = self.votes.lock().await.acquire(ballot);
        tracing::debug!(
            "Node {} entered critical section for {} at clock {}",
            self.identity,
            ballot.request_id,
            clock
        );
        Ok(())
    }

    async fn release_locks(&self, request_id: Uuid) -> Result<()> {
        self.votes.lock().await.release(&request_id);
        Ok(())
    }

    async fn release_read_lock(&self, request_id: Uuid) -> Result<()> {
        self.votes.lock().await.release_read(&request_id);
        Ok(())
    }

    async fn multicast_read_release(&self, request_id: Uuid) -> Result<()> {
        let Some(view) = self.active_view(&request_id).await else {
            return Ok(());
        };

        let releases = view.iter().map(|member| async move {
            let released = match self.locator.locate(member).await {
                Ok(node) => node.release_read_lock(request_id).await,
                Err(e) => Err(e),
            };
            if let Err(e) = released {
                tracing::warn!("Read lock release on {} failed: {}", member, e);
            }
        });
        join_all(releases).await;
        Ok(())
    }

    async fn apply_write(&self, ballot: &Ballot) -> Result<()> {
        let Some(content) = ballot.versioned_payload() else {
            return Err(Error::Other(format!(
                "write request {} carries no content",
                ballot.request_id
            )));
        };

        for id in &ballot.replica_ids {
            if self.store.record(*id).await.is_some() {
                if !self.store.write_content(*id, &content).await? {
                    tracing::debug!(
                        "Replica {} on {} already holds a newer version",
                        id,
                        self.identity
                    );
                }
            }
        }
        Ok(())
    }

    async fn read_replica(&self, ballot: &Ballot) -> Result<Option<String>> {
        let mut newest: Option<VersionedContent> = None;
        for id in &ballot.replica_ids {
            if let Some(content) = self.store.content(*id).await {
                if newest.as_ref().map_or(true, |n| content.version > n.version) {
                    newest = Some(content);
                }
            }
        }
        Ok(newest.map(|c| c.content))
    }
}
