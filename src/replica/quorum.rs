//! Quorum read/write coordination
//!
//! One request walks:
//!
//! ```text
//! RESOLVE -> SELECT_COORDINATOR -> VOTE -> DECIDE -> EXECUTE -> RELEASE
//!                                             \-> ABORT
//! ```
//!
//! The tally that gates EXECUTE belongs to the request: it is built from the
//! decision multicast and never shared with other requests.

use crate::common::{
    validate_filename, ActiveNodeSet, Ballot, Error, NodeRef, OperationType, Result, Tally,
};
use crate::replica::distributor::ReplicaDistributor;
use crate::replica::operation::{FileOperation, OperationExecutor};
use crate::replica::resolver::ActiveNodeResolver;
use crate::replica::select::{CoordinatorSelector, RandomSelector};
use crate::ring::rpc::{Locator, RingNode};
use futures_util::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

/// Result of one quorum request
#[derive(Debug, Clone)]
pub struct QuorumOutcome {
    pub request_id: Uuid,
    pub coordinator: NodeRef,
    /// Whether a majority of holders acknowledged the request
    pub acknowledged: bool,
    pub tally: Tally,
    /// Per-holder replies of the executed operation (empty on abort)
    pub replies: Vec<(NodeRef, Option<String>)>,
}

impl QuorumOutcome {
    /// Content returned by the most holders, if any holder returned content
    pub fn content(&self) -> Option<&str> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for content in self.replies.iter().filter_map(|(_, c)| c.as_deref()) {
            match counts.iter_mut().find(|(c, _)| *c == content) {
                Some((_, n)) => *n += 1,
                None => counts.push((content, 1)),
            }
        }
        counts
            .into_iter()
            .max_by_key(|(_, n)| *n)
            .map(|(content, _)| content)
    }
}

pub struct QuorumCoordinator {
    node: Arc<dyn RingNode>,
    locator: Arc<dyn Locator>,
    resolver: ActiveNodeResolver,
    distributor: Arc<ReplicaDistributor>,
    selector: Arc<dyn CoordinatorSelector>,
    executor: Arc<dyn OperationExecutor>,
}

impl QuorumCoordinator {
    /// Coordinator for requests issued by `node`, with random coordinator
    /// selection and the default file executor.
    pub fn new(
        node: Arc<dyn RingNode>,
        locator: Arc<dyn Locator>,
        distributor: Arc<ReplicaDistributor>,
    ) -> Self {
        let resolver = ActiveNodeResolver::new(node.clone(), locator.clone(), *distributor.keys());
        Self {
            executor: Arc::new(FileOperation::new(locator.clone())),
            node,
            locator,
            resolver,
            distributor,
            selector: Arc::new(RandomSelector),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn CoordinatorSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn OperationExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn resolver(&self) -> &ActiveNodeResolver {
        &self.resolver
    }

    pub async fn request_read(&self, filename: &str) -> Result<bool> {
        Ok(self.read(filename).await?.acknowledged)
    }

    pub async fn request_write(&self, filename: &str, content: &str) -> Result<bool> {
        Ok(self.write(filename, content).await?.acknowledged)
    }

    pub async fn read(&self, filename: &str) -> Result<QuorumOutcome> {
        self.execute(OperationType::Read, filename, None).await
    }

    pub async fn write(&self, filename: &str, content: &str) -> Result<QuorumOutcome> {
        self.execute(OperationType::Write, filename, Some(content.to_string()))
            .await
    }

    async fn execute(
        &self,
        operation: OperationType,
        filename: &str,
        payload: Option<String>,
    ) -> Result<QuorumOutcome> {
        validate_filename(filename)?;

        // RESOLVE
        let active = self.resolver.resolve(filename).await?;
        if active.is_empty() {
            return Err(Error::NoReplicaAvailable {
                filename: filename.to_string(),
            });
        }

        // SELECT_COORDINATOR
        let chosen = self
            .selector
            .select(&active)
            .ok_or_else(|| Error::NoReplicaAvailable {
                filename: filename.to_string(),
            })?;
        let coordinator = self.locator.locate(&chosen).await?;

        // VOTE
        let origin = self.node.identity().await?;
        let ballot = Ballot::new(
            operation,
            origin.clone(),
            filename,
            self.resolver.keys().generate(filename),
            payload,
        )
        .stamped(self.ballot_clock(operation, &active).await?);

        tracing::debug!(
            "Request {}: {} {} via {} over {} holders",
            ballot.request_id,
            operation,
            filename,
            chosen,
            active.len()
        );

        let granted = match self.vote(&coordinator, &ballot, &active).await {
            Ok(granted) => granted,
            Err(e) => {
                self.release_all(&ballot, &active, &origin).await;
                return Err(e);
            }
        };

        // DECIDE
        let ballot = ballot.with_decision(granted);
        let tally = self.multicast_decision(&ballot, &active).await;
        if !active.contains(&origin) {
            if let Err(e) = self.node.record_decision(&ballot).await {
                tracing::warn!("Recording decision locally failed: {}", e);
            }
        }

        if !tally.majority_acknowledged() {
            tracing::info!(
                "Request {} aborted: {}/{} acknowledgements",
                ballot.request_id,
                tally.acks,
                tally.active
            );
            self.release_all(&ballot, &active, &origin).await;
            return Ok(QuorumOutcome {
                request_id: ballot.request_id,
                coordinator: chosen,
                acknowledged: false,
                tally,
                replies: Vec::new(),
            });
        }

        // EXECUTE
        if let Err(e) = self.node.acquire_lock(&ballot).await {
            self.release_all(&ballot, &active, &origin).await;
            return Err(e);
        }

        let replies = match self.executor.perform(&coordinator, &ballot, &active).await {
            Ok(result) => result.replies,
            Err(e) => {
                tracing::warn!("Request {} execution failed: {}", ballot.request_id, e);
                Vec::new()
            }
        };

        match (operation, ballot.versioned_payload()) {
            (OperationType::Write, Some(content)) => {
                if let Err(e) = self.distributor.track_content(filename, content.clone()).await {
                    tracing::warn!("Request {} could not track {}: {}", ballot.request_id, filename, e);
                }
                let report = self
                    .distributor
                    .distribute_content(&ballot.replica_ids, &content)
                    .await;
                tracing::debug!(
                    "Request {} pushed content to {} successors",
                    ballot.request_id,
                    report.placed
                );
            }
            (OperationType::Read, _) => {
                if let Err(e) = self.executor.release_read_locks(&coordinator, &ballot).await {
                    tracing::warn!("Request {} read release failed: {}", ballot.request_id, e);
                }
            }
            _ => {}
        }

        // RELEASE
        self.release_all(&ballot, &active, &origin).await;

        tracing::info!(
            "Request {} ({} {}) done: {}/{} acknowledgements",
            ballot.request_id,
            operation,
            filename,
            tally.acks,
            tally.active
        );
        Ok(QuorumOutcome {
            request_id: ballot.request_id,
            coordinator: chosen,
            acknowledged: tally.majority_acknowledged(),
            tally,
            replies,
        })
    }

    /// Lamport stamp of a new ballot. WRITE stamps also pass every holder's
    /// clock so the written version outranks content the holders already have.
    async fn ballot_clock(&self, operation: OperationType, active: &ActiveNodeSet) -> Result<u64> {
        let clock = self.node.tick().await?;
        if operation != OperationType::Write {
            return Ok(clock);
        }

        let ticks = active.iter().map(|member| async move {
            let tick = match self.locator.locate(member).await {
                Ok(node) => node.tick().await,
                Err(e) => Err(e),
            };
            match tick {
                Ok(tick) => Some(tick),
                Err(e) => {
                    tracing::warn!("Clock of {} unavailable: {}", member, e);
                    None
                }
            }
        });
        Ok(join_all(ticks).await.into_iter().flatten().fold(clock, u64::max))
    }

    async fn vote(
        &self,
        coordinator: &Arc<dyn RingNode>,
        ballot: &Ballot,
        active: &ActiveNodeSet,
    ) -> Result<bool> {
        coordinator
            .set_active_nodes(ballot.request_id, active.clone())
            .await?;
        self.node
            .set_active_nodes(ballot.request_id, active.clone())
            .await?;

        match ballot.operation {
            OperationType::Read => coordinator.request_read_operation(ballot).await,
            OperationType::Write => coordinator.request_write_operation(ballot).await,
        }
    }

    /// Send the decided ballot to every holder; unreachable holders count as not acknowledging
    async fn multicast_decision(&self, ballot: &Ballot, active: &ActiveNodeSet) -> Tally {
        let sends = active.iter().map(|member| async move {
            let acknowledged = match self.locator.locate(member).await {
                Ok(node) => node.record_decision(ballot).await,
                Err(e) => Err(e),
            };
            match acknowledged {
                Ok(acknowledged) => acknowledged,
                Err(e) => {
                    tracing::warn!("Decision delivery to {} failed: {}", member, e);
                    false
                }
            }
        });

        let mut tally = Tally::new(active.len());
        for acknowledged in join_all(sends).await {
            tally.record(acknowledged);
        }
        tally
    }

    /// Best-effort release of everything the request holds, on every holder and locally
    async fn release_all(&self, ballot: &Ballot, active: &ActiveNodeSet, origin: &NodeRef) {
        let request_id = ballot.request_id;
        let releases = active.iter().map(|member| async move {
            let released = match self.locator.locate(member).await {
                Ok(node) => node.release_locks(request_id).await,
                Err(e) => Err(e),
            };
            if let Err(e) = released {
                tracing::warn!("Lock release on {} failed: {}", member, e);
            }
        });
        join_all(releases).await;

        if !active.contains(origin) {
            if let Err(e) = self.node.release_locks(request_id).await {
                tracing::warn!("Local lock release failed: {}", e);
            }
        }
    }
}
