//! User endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mbt_common::db::User;
use mbt_common::users;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = users::create_user(&state.db, &req.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:id
pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<User>> {
    Ok(Json(users::get_user(&state.db, id).await?))
}
