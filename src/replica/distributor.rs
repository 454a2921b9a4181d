//! Background replica distribution
//!
//! Each cycle resolves the current successor of every replica key in the
//! node's working set and (re)seeds the replica there. Unreachable
//! successors are skipped and retried on the next tick; nothing is queued.

use crate::common::{
    Error, NodeRef, PersistedReplicaRecord, ReplicaId, ReplicaSeed, Result, VersionedContent,
};
use crate::replica::keys::ReplicaKeyGenerator;
use crate::ring::rpc::{Locator, RingNode};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one distribution pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DistributionReport {
    /// Replicas seeded at their successor
    pub placed: usize,
    /// Replicas without a resolvable successor
    pub skipped: usize,
    /// Replicas whose migration failed with an error
    pub failed: usize,
}

impl std::ops::AddAssign for DistributionReport {
    fn add_assign(&mut self, other: Self) {
        self.placed += other.placed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

pub struct ReplicaDistributor {
    node: Arc<dyn RingNode>,
    locator: Arc<dyn Locator>,
    keys: ReplicaKeyGenerator,
    interval: Duration,
}

impl ReplicaDistributor {
    pub fn new(
        node: Arc<dyn RingNode>,
        locator: Arc<dyn Locator>,
        keys: ReplicaKeyGenerator,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidConfig(
                "distribution interval must be greater than zero".into(),
            ));
        }
        Ok(Self {
            node,
            locator,
            keys,
            interval,
        })
    }

    pub fn keys(&self) -> &ReplicaKeyGenerator {
        &self.keys
    }

    /// Add `filename` to the node's working set; returns its replica keys
    pub async fn track(&self, filename: &str) -> Result<Vec<ReplicaId>> {
        self.node.track_file(filename.to_string(), None).await?;
        Ok(self.keys.generate(filename))
    }

    /// Record the latest written content of `filename` in the node's working set
    pub async fn track_content(&self, filename: &str, content: VersionedContent) -> Result<()> {
        self.node
            .track_file(filename.to_string(), Some(content))
            .await
    }

    /// One pass over the node's working set, carrying each file's latest content
    pub async fn distribute(&self) -> DistributionReport {
        let files = match self.node.tracked_files().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Distribution pass skipped, working set unavailable: {}", e);
                return DistributionReport::default();
            }
        };

        let mut report = DistributionReport::default();
        for file in files {
            let ids = self.keys.generate(&file.filename);
            report += self.place(&ids, file.content).await;
        }
        report
    }

    /// One pass over a single tracked file
    pub async fn distribute_file(&self, filename: &str) -> Result<DistributionReport> {
        let files = self.node.tracked_files().await?;
        let Some(file) = files.into_iter().find(|f| f.filename == filename) else {
            return Err(Error::NotFound(format!("{} is not tracked", filename)));
        };
        let ids = self.keys.generate(&file.filename);
        Ok(self.place(&ids, file.content).await)
    }

    /// Push new content for `ids` to their current successors
    pub async fn distribute_content(
        &self,
        ids: &[ReplicaId],
        content: &VersionedContent,
    ) -> DistributionReport {
        self.place(ids, Some(content.clone())).await
    }

    async fn place(
        &self,
        ids: &[ReplicaId],
        content: Option<VersionedContent>,
    ) -> DistributionReport {
        let mut report = DistributionReport::default();

        let owner = match self.node.identity().await {
            Ok(identity) => PersistedReplicaRecord::from(&identity),
            Err(e) => {
                tracing::warn!("Distribution pass skipped, node identity unavailable: {}", e);
                report.failed = ids.len();
                return report;
            }
        };
        let seed = ReplicaSeed { owner, content };

        for id in ids {
            match self.place_one(*id, &seed).await {
                Ok(Some(successor)) => {
                    tracing::trace!("Replica {} placed on {}", id, successor);
                    report.placed += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Replica {} migration failed: {}", id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn place_one(&self, id: ReplicaId, seed: &ReplicaSeed) -> Result<Option<NodeRef>> {
        let Some(successor) = self.node.find_successor(id).await? else {
            return Ok(None);
        };

        let holder = self.locator.locate(&successor).await?;
        holder.add_to_file_key(id).await?;
        holder.create_local_record(seed.clone(), id).await?;
        Ok(Some(successor))
    }

    /// Run `distribute` every interval until `shutdown` is cancelled
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Replica distributor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.distribute().await;
                        tracing::debug!(
                            "Distribution pass: {} placed, {} skipped, {} failed",
                            report.placed,
                            report.skipped,
                            report.failed
                        );
                    }
                }
            }
        })
    }
}
