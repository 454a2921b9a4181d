//! HTTP surface of a ring node
//!
//! Every `RingNode` operation of a `LocalNode` is exposed as a JSON endpoint
//! under `/ring`. `RemoteNode` is the matching client.

use crate::common::{
    ActiveNodeSet, Ballot, Error, NodeRef, ReplicaId, ReplicaRecord, ReplicaSeed, Result,
    TrackedFile, VersionedContent,
};
use crate::ring::node::LocalNode;
use crate::ring::rpc::RingNode;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Largest accepted request body (file content travels inside ballots)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicaIdBody {
    pub id: ReplicaId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedBody {
    pub id: ReplicaId,
    pub seed: ReplicaSeed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackBody {
    pub filename: String,
    pub content: Option<VersionedContent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveNodesBody {
    pub request_id: Uuid,
    pub nodes: ActiveNodeSet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestIdBody {
    pub request_id: Uuid,
}

#[derive(Clone)]
pub struct NodeState {
    pub node: Arc<LocalNode>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn create_router(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ring/identity", get(identity))
        .route("/ring/clock/tick", post(tick))
        .route("/ring/successor", post(find_successor))
        .route("/ring/file-key", post(add_to_file_key))
        .route("/ring/record", post(create_local_record))
        .route("/ring/metadata", get(metadata))
        .route("/ring/track", post(track_file))
        .route("/ring/tracked", get(tracked_files))
        .route("/ring/active-nodes", post(set_active_nodes))
        .route("/ring/request/read", post(request_read_operation))
        .route("/ring/request/write", post(request_write_operation))
        .route("/ring/vote", post(vote))
        .route("/ring/decision", post(record_decision))
        .route("/ring/lock/acquire", post(acquire_lock))
        .route("/ring/lock/release", post(release_locks))
        .route("/ring/lock/release-read", post(release_read_lock))
        .route("/ring/lock/multicast-read-release", post(multicast_read_release))
        .route("/ring/write", post(apply_write))
        .route("/ring/read", post(read_replica))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<NodeState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "node": state.node.node_ref(),
            "clock": state.node.clock().await,
        })),
    )
}

async fn identity(State(state): State<NodeState>) -> Result<Json<NodeRef>> {
    Ok(Json(state.node.identity().await?))
}

async fn tick(State(state): State<NodeState>) -> Result<Json<u64>> {
    Ok(Json(state.node.tick().await?))
}

async fn find_successor(
    State(state): State<NodeState>,
    Json(body): Json<ReplicaIdBody>,
) -> Result<Json<Option<NodeRef>>> {
    Ok(Json(state.node.find_successor(body.id).await?))
}

async fn add_to_file_key(
    State(state): State<NodeState>,
    Json(body): Json<ReplicaIdBody>,
) -> Result<StatusCode> {
    state.node.add_to_file_key(body.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_local_record(
    State(state): State<NodeState>,
    Json(body): Json<SeedBody>,
) -> Result<StatusCode> {
    state.node.create_local_record(body.seed, body.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn metadata(State(state): State<NodeState>) -> Result<Json<Vec<ReplicaRecord>>> {
    let metadata = state.node.metadata().await?;
    Ok(Json(metadata.into_values().collect()))
}

async fn track_file(
    State(state): State<NodeState>,
    Json(body): Json<TrackBody>,
) -> Result<StatusCode> {
    state.node.track_file(body.filename, body.content).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tracked_files(State(state): State<NodeState>) -> Result<Json<Vec<TrackedFile>>> {
    Ok(Json(state.node.tracked_files().await?))
}

async fn set_active_nodes(
    State(state): State<NodeState>,
    Json(body): Json<ActiveNodesBody>,
) -> Result<StatusCode> {
    state
        .node
        .set_active_nodes(body.request_id, body.nodes)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_read_operation(
    State(state): State<NodeState>,
    Json(ballot): Json<Ballot>,
) -> Result<Json<bool>> {
    Ok(Json(state.node.request_read_operation(&ballot).await?))
}

async fn request_write_operation(
    State(state): State<NodeState>,
    Json(ballot): Json<Ballot>,
) -> Result<Json<bool>> {
    Ok(Json(state.node.request_write_operation(&ballot).await?))
}

async fn vote(State(state): State<NodeState>, Json(ballot): Json<Ballot>) -> Result<Json<bool>> {
    Ok(Json(state.node.vote(&ballot).await?))
}

async fn record_decision(
    State(state): State<NodeState>,
    Json(ballot): Json<Ballot>,
) -> Result<Json<bool>> {
    Ok(Json(state.node.record_decision(&ballot).await?))
}

async fn acquire_lock(
    State(state): State<NodeState>,
    Json(ballot): Json<Ballot>,
) -> Result<StatusCode> {
    state.node.acquire_lock(&ballot).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn release_locks(
    State(state): State<NodeState>,
    Json(body): Json<RequestIdBody>,
) -> Result<StatusCode> {
    state.node.release_locks(body.request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn release_read_lock(
    State(state): State<NodeState>,
    Json(body): Json<RequestIdBody>,
) -> Result<StatusCode> {
    state.node.release_read_lock(body.request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn multicast_read_release(
    State(state): State<NodeState>,
    Json(body): Json<RequestIdBody>,
) -> Result<StatusCode> {
    state.node.multicast_read_release(body.request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn apply_write(
    State(state): State<NodeState>,
    Json(ballot): Json<Ballot>,
) -> Result<StatusCode> {
    state.node.apply_write(&ballot).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_replica(
    State(state): State<NodeState>,
    Json(ballot): Json<Ballot>,
) -> Result<Json<Option<String>>> {
    Ok(Json(state.node.read_replica(&ballot).await?))
}
