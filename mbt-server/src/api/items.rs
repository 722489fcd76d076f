//! Backlog item endpoints: add, remove, rank moves, transfers, ELO and tags

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mbt_common::backlog_items::{self, EloPair};
use mbt_common::db::BacklogItem;
use mbt_common::elo::EloOutcome;
use mbt_common::tags;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub artifact_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub src_rank: i64,
    pub target_rank: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub artifact_id: i64,
    pub target_backlog_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct EloRequest {
    pub winner_id: i64,
    pub loser_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TagItemRequest {
    pub tag_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// POST /api/backlog/:id/add
pub async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<(StatusCode, Json<BacklogItem>)> {
    let item = backlog_items::add_item(&state.db, id, req.artifact_id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/backlog/:id/item/:artifact_id
///
/// Removing an absent item succeeds with `removed: false`.
pub async fn remove_item(
    State(state): State<AppState>,
    Path((id, artifact_id)): Path<(i64, i64)>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = backlog_items::remove_item(&state.db, id, artifact_id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// POST /api/backlog/:id/move
pub async fn move_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<Value>> {
    backlog_items::move_item(&state.db, id, req.src_rank, req.target_rank).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// POST /api/backlog/:id/transfer
pub async fn transfer_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<Json<BacklogItem>> {
    let item =
        backlog_items::transfer_item(&state.db, id, req.artifact_id, req.target_backlog_id).await?;
    Ok(Json(item))
}

/// POST /api/backlog/:id/elo
pub async fn elo_fight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<EloRequest>,
) -> ApiResult<Json<EloOutcome>> {
    let outcome = backlog_items::elo_fight(&state.db, id, req.winner_id, req.loser_id).await?;
    Ok(Json(outcome))
}

/// GET /api/backlog/:id/elo/pair
pub async fn elo_pair(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<EloPair>> {
    Ok(Json(backlog_items::elo_pair(&state.db, id).await?))
}

/// POST /api/backlog/:id/item/:artifact_id/tag
pub async fn tag_item(
    State(state): State<AppState>,
    Path((id, artifact_id)): Path<(i64, i64)>,
    Json(req): Json<TagItemRequest>,
) -> ApiResult<Json<Value>> {
    tags::tag_item(&state.db, id, artifact_id, req.tag_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// DELETE /api/backlog/:id/item/:artifact_id/tag/:tag_id
pub async fn untag_item(
    State(state): State<AppState>,
    Path((id, artifact_id, tag_id)): Path<(i64, i64, i64)>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = tags::untag_item(&state.db, id, artifact_id, tag_id).await?;
    Ok(Json(RemovedResponse { removed }))
}
