//! HTTP API handlers for mbt-server

pub mod artifacts;
pub mod backlogs;
pub mod buildinfo;
pub mod genres;
pub mod health;
pub mod items;
pub mod tags;
pub mod users;

pub use artifacts::{
    create_artifact, delete_artifact, get_artifact, get_status, list_artifacts, set_status,
    update_artifact,
};
pub use backlogs::{create_backlog, delete_backlog, get_backlog, list_backlogs, update_backlog};
pub use buildinfo::get_build_info;
pub use genres::{create_genre, list_genres};
pub use health::health_routes;
pub use items::{
    add_item, elo_fight, elo_pair, move_item, remove_item, tag_item, transfer_item, untag_item,
};
pub use tags::{create_tag, delete_tag, list_tags, move_tag, update_tag};
pub use users::{create_user, get_user};
