//! Quorum reads and writes over in-process rings

mod common;

use async_trait::async_trait;
use chordfs::common::{ActiveNodeSet, Ballot, Error, NodeRef, OperationType, Result};
use chordfs::replica::{
    FileOperation, OperationExecutor, OperationResult, RoundRobinSelector,
};
use chordfs::ring::{Locator, RingNode};
use common::{Ring, THREE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const REPLICAS: usize = 8;

/// Executor that counts how often it is asked to run
struct CountingExecutor {
    inner: FileOperation,
    calls: AtomicUsize,
}

impl CountingExecutor {
    fn new(locator: Arc<dyn Locator>) -> Arc<Self> {
        Arc::new(Self {
            inner: FileOperation::new(locator),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationExecutor for CountingExecutor {
    async fn perform(
        &self,
        coordinator: &Arc<dyn RingNode>,
        ballot: &Ballot,
        active: &ActiveNodeSet,
    ) -> Result<OperationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.perform(coordinator, ballot, active).await
    }
}

/// Grant a vote for an unrelated request on `node`; returns its request id
async fn occupy(node: &Arc<chordfs::LocalNode>, operation: OperationType) -> Uuid {
    let ballot = Ballot::new(
        operation,
        NodeRef::with_id(0, "elsewhere:9091"),
        "other.txt",
        vec![],
        None,
    );
    assert!(node.vote(&ballot).await.unwrap());
    ballot.request_id
}

async fn distributed(ring: &Ring, issuer: usize) -> (String, chordfs::QuorumCoordinator) {
    let filename = ring.spread_file(REPLICAS).await;
    let distributor = ring.distributor(issuer, REPLICAS);
    distributor.track(&filename).await.unwrap();
    distributor.distribute().await;
    (filename, ring.coordinator(distributor, issuer))
}

#[tokio::test]
async fn test_empty_active_set_fails_before_selection() {
    let ring = Ring::new(&THREE).await;
    let executor = CountingExecutor::new(ring.network.clone());
    let coordinator = ring
        .coordinator(ring.distributor(0, 4), 0)
        .with_executor(executor.clone());

    let read = coordinator.request_read("nowhere.txt").await;
    assert!(matches!(read, Err(Error::NoReplicaAvailable { .. })));
    let write = coordinator.request_write("nowhere.txt", "data").await;
    assert!(matches!(write, Err(Error::NoReplicaAvailable { .. })));

    assert_eq!(executor.calls(), 0);
    assert!(ring.all_idle().await);
}

#[tokio::test]
async fn test_invalid_filename_rejected() {
    let ring = Ring::new(&THREE).await;
    let coordinator = ring.coordinator(ring.distributor(0, 4), 0);
    assert!(coordinator.request_read("").await.is_err());
}

#[tokio::test]
async fn test_write_then_read_returns_content() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;

    let written = coordinator.write(&filename, "hello ring").await.unwrap();
    assert!(written.acknowledged);
    assert_eq!(written.tally.active, 3);
    assert_eq!(written.tally.acks, 3);

    let read = coordinator.read(&filename).await.unwrap();
    assert!(read.acknowledged);
    assert_eq!(read.content(), Some("hello ring"));
    let matching = read
        .replies
        .iter()
        .filter(|(_, c)| c.as_deref() == Some("hello ring"))
        .count();
    assert!(matching > read.tally.active / 2);

    assert!(ring.all_idle().await);
}

#[tokio::test]
async fn test_latest_write_wins() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 1).await;

    assert!(coordinator.request_write(&filename, "v1").await.unwrap());
    assert!(coordinator.request_write(&filename, "v2").await.unwrap());

    let read = coordinator.read(&filename).await.unwrap();
    assert_eq!(read.content(), Some("v2"));
}

#[tokio::test]
async fn test_majority_with_one_busy_holder() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;
    let other = occupy(&ring.nodes[2], OperationType::Write).await;

    let outcome = coordinator.write(&filename, "two of three").await.unwrap();
    assert!(outcome.acknowledged);
    assert_eq!(outcome.tally.active, 3);
    assert_eq!(outcome.tally.acks, 2);

    for node in &ring.nodes {
        assert!(!node.holds_vote(&outcome.request_id).await);
    }
    // The unrelated grant is untouched
    assert!(ring.nodes[2].holds_vote(&other).await);
}

#[tokio::test]
async fn test_abort_without_majority_has_no_side_effects() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;
    let executor = CountingExecutor::new(ring.network.clone());
    let coordinator = coordinator.with_executor(executor.clone());

    assert!(coordinator.request_write(&filename, "before").await.unwrap());
    assert_eq!(executor.calls(), 1);

    let first = occupy(&ring.nodes[1], OperationType::Write).await;
    let second = occupy(&ring.nodes[2], OperationType::Write).await;

    let outcome = coordinator.write(&filename, "after").await.unwrap();
    assert!(!outcome.acknowledged);
    assert!(outcome.tally.acks <= 1);
    assert!(outcome.replies.is_empty());
    assert_eq!(executor.calls(), 1);

    for node in &ring.nodes {
        assert!(!node.holds_vote(&outcome.request_id).await);
        for id in node.store().file_keys().await {
            if let Some(content) = node.store().read_content(id).await {
                assert_eq!(content, "before");
            }
        }
    }
    assert!(ring.nodes[0].is_idle().await);

    // Once the other request lets go the write goes through
    ring.nodes[1].release_locks(first).await.unwrap();
    ring.nodes[2].release_locks(second).await.unwrap();
    assert!(coordinator.request_write(&filename, "after").await.unwrap());
    assert_eq!(executor.calls(), 2);
    assert!(ring.all_idle().await);
}

#[tokio::test]
async fn test_reads_share_but_block_writes() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;
    assert!(coordinator.request_write(&filename, "shared").await.unwrap());

    let mut readers = Vec::new();
    for node in &ring.nodes {
        readers.push(occupy(node, OperationType::Read).await);
    }

    let read = coordinator.read(&filename).await.unwrap();
    assert!(read.acknowledged);
    assert_eq!(read.content(), Some("shared"));

    assert!(!coordinator.request_write(&filename, "blocked").await.unwrap());

    for (node, reader) in ring.nodes.iter().zip(readers) {
        node.release_read_lock(reader).await.unwrap();
    }
    assert!(ring.all_idle().await);
}

#[tokio::test]
async fn test_concurrent_reads_both_acknowledged() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;
    assert!(coordinator.request_write(&filename, "concurrent").await.unwrap());

    let other = ring.coordinator(ring.distributor(1, REPLICAS), 1);
    let (a, b) = tokio::join!(coordinator.read(&filename), other.read(&filename));
    assert!(a.unwrap().acknowledged);
    assert!(b.unwrap().acknowledged);
    assert!(ring.all_idle().await);
}

#[tokio::test]
async fn test_unreachable_holder_propagates_transport_error() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;

    let down = ring.nodes[2].node_ref().node_id;
    ring.network.disconnect(down).await;
    let err = coordinator.request_read(&filename).await.unwrap_err();
    assert!(err.is_transport());

    // No retry inside the protocol; the caller retries once the peer is back
    ring.network.reconnect(down).await;
    assert!(coordinator.request_read(&filename).await.unwrap());
}

#[tokio::test]
async fn test_round_robin_coordinator_selection() {
    let ring = Ring::new(&THREE).await;
    let (filename, coordinator) = distributed(&ring, 0).await;
    let coordinator = coordinator.with_selector(Arc::new(RoundRobinSelector::default()));

    let active = coordinator.resolver().resolve(&filename).await.unwrap();
    let expected: Vec<NodeRef> = active.iter().cloned().collect();

    let mut chosen = Vec::new();
    for _ in 0..expected.len() {
        chosen.push(coordinator.read(&filename).await.unwrap().coordinator);
    }
    assert_eq!(chosen, expected);
}

#[tokio::test]
async fn test_issuer_outside_holder_set() {
    let ring = Ring::new(&THREE).await;
    let outsider = ring.nodes[0].node_ref().node_id;

    let mut filename = None;
    for i in 0..1000 {
        let candidate = format!("remote-{}.txt", i);
        if !ring.successors(&candidate, 2).await.contains(&outsider) {
            filename = Some(candidate);
            break;
        }
    }
    let filename = filename.unwrap();

    // Seeded by a holder, requested by the outsider
    let seeder = ring.nodes.iter().position(|n| n.node_ref().node_id != outsider).unwrap();
    let distributor = ring.distributor(seeder, 2);
    distributor.track(&filename).await.unwrap();
    distributor.distribute().await;

    let coordinator = ring.coordinator(ring.distributor(0, 2), 0);
    let outcome = coordinator.write(&filename, "from outside").await.unwrap();
    assert!(outcome.acknowledged);
    assert!(!coordinator
        .resolver()
        .resolve(&filename)
        .await
        .unwrap()
        .contains(ring.nodes[0].node_ref()));

    let read = coordinator.read(&filename).await.unwrap();
    assert_eq!(read.content(), Some("from outside"));
    assert!(ring.all_idle().await);
}
