//! HTTP stub for a ring node running in another process

use crate::common::{
    ActiveNodeSet, Ballot, Error, NodeRef, ReplicaId, ReplicaRecord, ReplicaSeed, Result,
    TrackedFile, VersionedContent,
};
use crate::ring::http::{ActiveNodesBody, ReplicaIdBody, RequestIdBody, SeedBody, TrackBody};
use crate::ring::rpc::{Locator, RingNode};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct RemoteNode {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteNode {
    pub fn new(address: &str, client: reqwest::Client) -> Self {
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address)
        };
        Self { base_url, client }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::check(path, response).await.map(|_| ())
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Transport(format!("{} returned {}: {}", path, status, body)))
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
        let response = Self::check(path, response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RingNode for RemoteNode {
    async fn identity(&self) -> Result<NodeRef> {
        self.get("/ring/identity").await
    }

    async fn tick(&self) -> Result<u64> {
        self.post("/ring/clock/tick", &()).await
    }

    async fn find_successor(&self, id: ReplicaId) -> Result<Option<NodeRef>> {
        self.post("/ring/successor", &ReplicaIdBody { id }).await
    }

    async fn add_to_file_key(&self, id: ReplicaId) -> Result<()> {
        self.post_unit("/ring/file-key", &ReplicaIdBody { id }).await
    }

    async fn create_local_record(&self, seed: ReplicaSeed, id: ReplicaId) -> Result<()> {
        self.post_unit("/ring/record", &SeedBody { id, seed }).await
    }

    async fn metadata(&self) -> Result<HashMap<ReplicaId, ReplicaRecord>> {
        let records: Vec<ReplicaRecord> = self.get("/ring/metadata").await?;
        Ok(records
            .into_iter()
            .map(|record| (record.replica_id, record))
            .collect())
    }

    async fn track_file(&self, filename: String, content: Option<VersionedContent>) -> Result<()> {
        self.post_unit("/ring/track", &TrackBody { filename, content })
            .await
    }

    async fn tracked_files(&self) -> Result<Vec<TrackedFile>> {
        self.get("/ring/tracked").await
    }

    async fn set_active_nodes(&self, request_id: Uuid, nodes: ActiveNodeSet) -> Result<()> {
        self.post_unit("/ring/active-nodes", &ActiveNodesBody { request_id, nodes })
            .await
    }

    async fn request_read_operation(&self, ballot: &Ballot) -> Result<bool> {
        self.post("/ring/request/read", ballot).await
    }

    async fn request_write_operation(&self, ballot: &Ballot) -> Result<bool> {
        self.post("/ring/request/write", ballot).await
    }

    async fn vote(&self, ballot: &Ballot) -> Result<bool> {
        self.post("/ring/vote", ballot).await
    }

    async fn record_decision(&self, ballot: &Ballot) -> Result<bool> {
        self.post("/ring/decision", ballot).await
    }

    async fn acquire_lock(&self, ballot: &Ballot) -> Result<()> {
        self.post_unit("/ring/lock/acquire", ballot).await
    }

    async fn release_locks(&self, request_id: Uuid) -> Result<()> {
        self.post_unit("/ring/lock/release", &RequestIdBody { request_id })
            .await
    }

    async fn release_read_lock(&self, request_id: Uuid) -> Result<()> {
        self.post_unit("/ring/lock/release-read", &RequestIdBody { request_id })
            .await
    }

    async fn multicast_read_release(&self, request_id: Uuid) -> Result<()> {
        self.post_unit(
            "/ring/lock/multicast-read-release",
            &RequestIdBody { request_id },
        )
        .await
    }

    async fn apply_write(&self, ballot: &Ballot) -> Result<()> {
        self.post_unit("/ring/write", ballot).await
    }

    async fn read_replica(&self, ballot: &Ballot) -> Result<Option<String>> {
        self.post("/ring/read", ballot).await
    }
}

/// Locator that reaches every node over HTTP at its advertised address
pub struct HttpLocator {
    client: reqwest::Client,
}

impl HttpLocator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Locator for HttpLocator {
    async fn locate(&self, node: &NodeRef) -> Result<Arc<dyn RingNode>> {
        Ok(Arc::new(RemoteNode::new(&node.address, self.client.clone())))
    }
}
