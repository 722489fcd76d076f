//! Backlog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mbt_common::backlog_items::{self, BacklogEntry};
use mbt_common::backlogs::{self, BacklogSummary, BacklogUpdate, NewBacklog};
use mbt_common::db::Backlog;
use mbt_common::filters::{ItemFilter, ItemSort};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: i64,
}

/// A backlog with its (filtered, sorted) items
#[derive(Debug, Serialize)]
pub struct BacklogView {
    #[serde(flatten)]
    pub backlog: Backlog,
    pub items: Vec<BacklogEntry>,
}

/// POST /api/backlog
pub async fn create_backlog(
    State(state): State<AppState>,
    Json(new): Json<NewBacklog>,
) -> ApiResult<(StatusCode, Json<Backlog>)> {
    let backlog = backlogs::create_backlog(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(backlog)))
}

/// GET /api/backlog?user_id=
pub async fn list_backlogs(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<BacklogSummary>>> {
    Ok(Json(backlogs::list_backlogs(&state.db, query.user_id).await?))
}

/// GET /api/backlog/:id?q=&genre_id=&tag_id=&status=&released=&sort=&order=
pub async fn get_backlog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(filter): Query<ItemFilter>,
    Query(sort): Query<ItemSort>,
) -> ApiResult<Json<BacklogView>> {
    let backlog = backlogs::get_backlog(&state.db, id).await?;
    let today = chrono::Local::now().date_naive();
    let items = backlog_items::list_items(&state.db, id, &filter, &sort, today).await?;
    Ok(Json(BacklogView { backlog, items }))
}

/// PUT /api/backlog/:id
pub async fn update_backlog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<BacklogUpdate>,
) -> ApiResult<Json<Backlog>> {
    Ok(Json(backlogs::update_backlog(&state.db, id, &update).await?))
}

/// DELETE /api/backlog/:id
pub async fn delete_backlog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    backlogs::delete_backlog(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
