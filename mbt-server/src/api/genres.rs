//! Genre endpoints

use axum::{extract::State, http::StatusCode, Json};
use mbt_common::db::Genre;
use mbt_common::genres;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateGenreRequest {
    pub title: String,
}

/// GET /api/genre
pub async fn list_genres(State(state): State<AppState>) -> ApiResult<Json<Vec<Genre>>> {
    Ok(Json(genres::list_genres(&state.db).await?))
}

/// POST /api/genre
///
/// Returns the existing genre when the title is already known.
pub async fn create_genre(
    State(state): State<AppState>,
    Json(req): Json<CreateGenreRequest>,
) -> ApiResult<(StatusCode, Json<Genre>)> {
    let genre = genres::create_genre(&state.db, &req.title).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}
