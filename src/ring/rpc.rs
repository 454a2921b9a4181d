//! Node RPC surface
//!
//! `RingNode` is everything a ring participant exposes to its peers and to the
//! replica protocol. `LocalNode` implements it in-process; `RemoteNode` is the
//! HTTP stub for a peer in another process. `Locator` turns a `NodeRef` into
//! one of those.

use crate::common::{
    ActiveNodeSet, Ballot, NodeRef, ReplicaId, ReplicaRecord, ReplicaSeed, Result, TrackedFile,
    VersionedContent,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait RingNode: Send + Sync {
    async fn identity(&self) -> Result<NodeRef>;

    /// Advance this node's logical clock; returns the new value
    async fn tick(&self) -> Result<u64>;

    /// Routing primitive: node responsible for `id`
    async fn find_successor(&self, id: ReplicaId) -> Result<Option<NodeRef>>;

    /// Register ownership of a replica key
    async fn add_to_file_key(&self, id: ReplicaId) -> Result<()>;

    /// Persist the seeding record (and content, if any) of a replica
    async fn create_local_record(&self, seed: ReplicaSeed, id: ReplicaId) -> Result<()>;

    async fn metadata(&self) -> Result<HashMap<ReplicaId, ReplicaRecord>>;

    /// Add a file to the distribution working set of this node, with its
    /// latest known content if any
    async fn track_file(&self, filename: String, content: Option<VersionedContent>) -> Result<()>;

    /// Distribution working set of this node
    async fn tracked_files(&self) -> Result<Vec<TrackedFile>>;

    /// Share the replica-holder view of one request
    async fn set_active_nodes(&self, request_id: Uuid, nodes: ActiveNodeSet) -> Result<()>;

    /// Poll every holder of the request for a READ vote; aggregated decision
    async fn request_read_operation(&self, ballot: &Ballot) -> Result<bool>;

    /// Poll every holder of the request for a WRITE vote; aggregated decision
    async fn request_write_operation(&self, ballot: &Ballot) -> Result<bool>;

    /// This node's individual vote
    async fn vote(&self, ballot: &Ballot) -> Result<bool>;

    /// Record the final decision; true when this node acknowledges it
    async fn record_decision(&self, ballot: &Ballot) -> Result<bool>;

    /// Enter the critical section for the request (ticks the logical clock)
    async fn acquire_lock(&self, ballot: &Ballot) -> Result<()>;

    async fn release_locks(&self, request_id: Uuid) -> Result<()>;

    async fn release_read_lock(&self, request_id: Uuid) -> Result<()>;

    /// Ask every holder of the request to drop its read lock
    async fn multicast_read_release(&self, request_id: Uuid) -> Result<()>;

    /// Store the ballot payload under every listed replica this node holds
    async fn apply_write(&self, ballot: &Ballot) -> Result<()>;

    /// Newest content among the listed replicas this node holds
    async fn read_replica(&self, ballot: &Ballot) -> Result<Option<String>>;
}

/// Service discovery: resolve a node reference to a callable node
#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self, node: &NodeRef) -> Result<Arc<dyn RingNode>>;
}
