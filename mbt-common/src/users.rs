//! User accounts
//!
//! Users only own backlogs, tags and statuses; there is no authentication.

use crate::db::{begin_write, User};
use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

const USER_COLUMNS: &str = "id, username, created_at";

/// Create a user; usernames are unique
pub async fn create_user(db: &SqlitePool, username: &str) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidInput("Username must not be empty".to_string()));
    }

    let mut tx = begin_write(db).await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(&mut *tx)
        .await?;
    if exists {
        return Err(Error::Conflict(format!("Username already taken: {}", username)));
    }

    let sql = format!("INSERT INTO users (username) VALUES (?) RETURNING {}", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = user.id, "Created user {}", user.username);
    Ok(user)
}

async fn fetch_user(conn: &mut SqliteConnection, id: i64) -> Result<User> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

pub async fn get_user(db: &SqlitePool, id: i64) -> Result<User> {
    let mut conn = db.acquire().await?;
    fetch_user(&mut conn, id).await
}

/// Fails with `NotFound` unless the user exists
pub async fn ensure_user(db: &SqlitePool, id: i64) -> Result<()> {
    get_user(db, id).await.map(|_| ())
}

/// `ensure_user` on an open connection, for checks inside a write transaction
pub async fn ensure_user_in(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    fetch_user(conn, id).await.map(|_| ())
}
