//! Artifact catalog and per-user status endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mbt_common::artifacts::{self, ArtifactDetails, ArtifactUpdate, NewArtifact};
use mbt_common::db::{Artifact, ArtifactType, UserArtifact};
use mbt_common::user_artifacts::{self, StatusUpdate};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::pagination::CatalogPage;
use crate::AppState;

/// Query parameters for the catalog listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<ArtifactType>,
    /// Title substring
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<Artifact>,
    #[serde(flatten)]
    pub page: CatalogPage,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub user_id: i64,
}

/// POST /api/artifact
pub async fn create_artifact(
    State(state): State<AppState>,
    Json(new): Json<NewArtifact>,
) -> ApiResult<(StatusCode, Json<ArtifactDetails>)> {
    let details = artifacts::create_artifact(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /api/artifact?type=&q=&page=
///
/// Top-level artifacts only, ordered by title.
pub async fn list_artifacts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ArtifactListResponse>> {
    let q = query.q.as_deref();
    let total = artifacts::count_artifacts(&state.db, query.kind, q).await?;
    let page = CatalogPage::new(total, query.page);
    let rows = artifacts::list_artifacts(&state.db, query.kind, q, page.page_size, page.offset())
        .await?;

    Ok(Json(ArtifactListResponse { artifacts: rows, page }))
}

/// GET /api/artifact/:id
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ArtifactDetails>> {
    Ok(Json(artifacts::get_artifact(&state.db, id).await?))
}

/// PUT /api/artifact/:id
pub async fn update_artifact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ArtifactUpdate>,
) -> ApiResult<Json<ArtifactDetails>> {
    Ok(Json(artifacts::update_artifact(&state.db, id, &update).await?))
}

/// DELETE /api/artifact/:id
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    artifacts::delete_artifact(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/artifact/:id/status?user_id=
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<UserArtifact>> {
    Ok(Json(user_artifacts::get_status(&state.db, query.user_id, id).await?))
}

/// PUT /api/artifact/:id/status
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<UserArtifact>> {
    Ok(Json(user_artifacts::set_status(&state.db, id, &update).await?))
}
