//! Tag endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mbt_common::db::Tag;
use mbt_common::tags::{self, NewTag, TagUpdate};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct MoveTagRequest {
    pub user_id: i64,
    pub src_position: i64,
    pub target_position: i64,
}

/// POST /api/tag
pub async fn create_tag(
    State(state): State<AppState>,
    Json(new): Json<NewTag>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let tag = tags::create_tag(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /api/tag?user_id=
pub async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(tags::list_tags(&state.db, query.user_id).await?))
}

/// PUT /api/tag/:id
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<TagUpdate>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(tags::update_tag(&state.db, id, &update).await?))
}

/// DELETE /api/tag/:id
pub async fn delete_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    tags::delete_tag(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tag/move
pub async fn move_tag(
    State(state): State<AppState>,
    Json(req): Json<MoveTagRequest>,
) -> ApiResult<Json<Value>> {
    tags::move_tag(&state.db, req.user_id, req.src_position, req.target_position).await?;
    Ok(Json(json!({ "status": "ok" })))
}
