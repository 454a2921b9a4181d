//! Ring node server

use crate::common::{NodeConfig, NodeRef, Result};
use crate::replica::{ReplicaDistributor, ReplicaKeyGenerator};
use crate::ring::client::HttpLocator;
use crate::ring::http::{create_router, NodeState};
use crate::ring::node::LocalNode;
use crate::ring::topology::StaticRing;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct NodeServer {
    config: NodeConfig,
}

impl NodeServer {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;
        let identity = NodeRef::new(&self.config.address);

        tracing::info!("Starting ring node: {}", identity);
        tracing::info!("  RPC API: {}", self.config.bind_addr);
        tracing::info!("  Data dir: {}", self.config.data_dir.display());
        tracing::info!("  Replicas: {}", self.config.replicas);
        tracing::info!("  Ring members: {}", self.config.ring_members().len());

        let topology = Arc::new(StaticRing::from_addresses(&self.config.ring_members()));
        let locator = Arc::new(HttpLocator::new(self.config.request_timeout())?);
        let node = Arc::new(
            LocalNode::open(
                identity,
                &self.config.data_dir,
                topology,
                locator.clone(),
            )
            .await?,
        );

        let keys = ReplicaKeyGenerator::new(self.config.replicas)?;
        let distributor = Arc::new(ReplicaDistributor::new(
            node.clone(),
            locator,
            keys,
            self.config.distribution_interval(),
        )?);
        for filename in &self.config.files {
            distributor.track(filename).await?;
        }

        let shutdown = CancellationToken::new();
        let distributor_handle = distributor.clone().start(shutdown.clone());

        let router = create_router(NodeState { node });
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("✓ Ring node ready ({} files tracked)", self.config.files.len());

        let signal = shutdown.clone();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                    }
                    _ = signal.cancelled() => {}
                }
            })
            .await;

        shutdown.cancel();
        if let Err(e) = distributor_handle.await {
            tracing::error!("Distributor task failed: {}", e);
        }
        served?;
        Ok(())
    }
}
