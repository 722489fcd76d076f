//! # Media Backlog Tracker Common Library
//!
//! Shared code for the backlog tracker service including:
//! - Database initialization, migrations and row models
//! - Rank renumbering over ranked tables
//! - ELO rating updates
//! - Repositories for users, artifacts, genres, backlogs, items and tags
//! - Configuration loading

pub mod artifacts;
pub mod backlog_items;
pub mod backlogs;
pub mod config;
pub mod db;
pub mod elo;
pub mod error;
pub mod filters;
pub mod genres;
pub mod ranking;
pub mod tags;
pub mod user_artifacts;
pub mod users;

pub use error::{Error, Result};
