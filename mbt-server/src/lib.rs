//! mbt-server library - HTTP service for the media backlog tracker
//!
//! Exposes the repositories of `mbt-common` as a JSON API.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post, put};

    let api_routes = Router::new()
        .route("/users", post(api::create_user))
        .route("/users/:id", get(api::get_user))
        .route("/artifact", post(api::create_artifact).get(api::list_artifacts))
        .route(
            "/artifact/:id",
            get(api::get_artifact)
                .put(api::update_artifact)
                .delete(api::delete_artifact),
        )
        .route(
            "/artifact/:id/status",
            get(api::get_status).put(api::set_status),
        )
        .route("/genre", get(api::list_genres).post(api::create_genre))
        .route("/backlog", post(api::create_backlog).get(api::list_backlogs))
        .route(
            "/backlog/:id",
            get(api::get_backlog)
                .put(api::update_backlog)
                .delete(api::delete_backlog),
        )
        .route("/backlog/:id/add", post(api::add_item))
        .route("/backlog/:id/item/:artifact_id", delete(api::remove_item))
        .route("/backlog/:id/move", post(api::move_item))
        .route("/backlog/:id/transfer", post(api::transfer_item))
        .route("/backlog/:id/elo", post(api::elo_fight))
        .route("/backlog/:id/elo/pair", get(api::elo_pair))
        .route("/backlog/:id/item/:artifact_id/tag", post(api::tag_item))
        .route(
            "/backlog/:id/item/:artifact_id/tag/:tag_id",
            delete(api::untag_item),
        )
        .route("/tag", post(api::create_tag).get(api::list_tags))
        .route("/tag/move", post(api::move_tag))
        .route("/tag/:id", put(api::update_tag).delete(api::delete_tag));

    Router::new()
        .nest("/api", api_routes)
        .route("/build_info", get(api::get_build_info))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
