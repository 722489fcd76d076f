//! Backlog lists
//!
//! A backlog belongs to one user and holds artifacts of a single type.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::db::{begin_write, ArtifactType, Backlog, BacklogRanking, BacklogType};
use crate::ranking::{self, VIRTUAL_WISHLIST};
use crate::{backlog_items, users, Error, Result};

const BACKLOG_COLUMNS: &str = "id, user_id, type, ranking, title, artifact_type, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewBacklog {
    pub user_id: i64,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: BacklogType,
    #[serde(default)]
    pub ranking: BacklogRanking,
    pub artifact_type: ArtifactType,
}

/// Partial update; the artifact type of a backlog never changes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BacklogUpdate {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<BacklogType>,
    pub ranking: Option<BacklogRanking>,
}

/// Backlog with its item count, for list views
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BacklogSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub backlog: Backlog,
    pub item_count: i64,
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Backlog title must not be empty".to_string()));
    }
    Ok(())
}

pub async fn create_backlog(db: &SqlitePool, new: &NewBacklog) -> Result<Backlog> {
    validate_title(&new.title)?;
    if !new.artifact_type.is_top_level() {
        return Err(Error::InvalidInput(format!(
            "Backlogs cannot hold {} artifacts",
            new.artifact_type
        )));
    }

    let mut tx = begin_write(db).await?;
    users::ensure_user_in(&mut tx, new.user_id).await?;
    let sql = format!(
        "INSERT INTO backlog (user_id, type, ranking, title, artifact_type) VALUES (?, ?, ?, ?, ?) RETURNING {}",
        BACKLOG_COLUMNS
    );
    let backlog = sqlx::query_as::<_, Backlog>(&sql)
        .bind(new.user_id)
        .bind(new.kind)
        .bind(new.ranking)
        .bind(new.title.trim())
        .bind(new.artifact_type)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        backlog_id = backlog.id,
        user_id = backlog.user_id,
        ranking = %backlog.ranking,
        "Created backlog '{}'",
        backlog.title
    );
    Ok(backlog)
}

/// Load a backlog on an existing connection (inside a transaction)
pub async fn get_backlog_in(conn: &mut SqliteConnection, id: i64) -> Result<Backlog> {
    let sql = format!("SELECT {} FROM backlog WHERE id = ?", BACKLOG_COLUMNS);
    sqlx::query_as::<_, Backlog>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Backlog not found: {}", id)))
}

pub async fn get_backlog(db: &SqlitePool, id: i64) -> Result<Backlog> {
    let mut conn = db.acquire().await?;
    get_backlog_in(&mut conn, id).await
}

pub async fn list_backlogs(db: &SqlitePool, user_id: i64) -> Result<Vec<BacklogSummary>> {
    users::ensure_user(db, user_id).await?;

    let rows = sqlx::query_as::<_, BacklogSummary>(
        r#"
        SELECT b.id, b.user_id, b.type, b.ranking, b.title, b.artifact_type, b.created_at,
               (SELECT COUNT(*) FROM backlog_item bi WHERE bi.backlog_id = b.id) AS item_count
        FROM backlog b
        WHERE b.user_id = ?
        ORDER BY b.artifact_type, b.title COLLATE NOCASE, b.id
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn update_backlog(db: &SqlitePool, id: i64, update: &BacklogUpdate) -> Result<Backlog> {
    let mut tx = begin_write(db).await?;
    let current = get_backlog_in(&mut tx, id).await?;

    let title = update.title.as_deref().unwrap_or(&current.title).trim().to_string();
    validate_title(&title)?;
    let kind = update.kind.unwrap_or(current.kind);
    let new_ranking = update.ranking.unwrap_or(current.ranking);

    sqlx::query("UPDATE backlog SET title = ?, type = ?, ranking = ? WHERE id = ?")
        .bind(&title)
        .bind(kind)
        .bind(new_ranking)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if new_ranking != current.ranking {
        let artifact_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT artifact_id FROM backlog_item WHERE backlog_id = ? ORDER BY rank",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for artifact_id in artifact_ids {
            if new_ranking == BacklogRanking::Wishlist {
                backlog_items::register_wishlist(&mut tx, current.user_id, artifact_id).await?;
            } else if current.ranking == BacklogRanking::Wishlist {
                backlog_items::unregister_wishlist_if_unused(&mut tx, current.user_id, artifact_id)
                    .await?;
            }
        }
        ranking::normalize(&mut tx, VIRTUAL_WISHLIST, current.user_id).await?;
        info!(backlog_id = id, from = %current.ranking, to = %new_ranking, "Changed backlog ranking");
    }

    let backlog = get_backlog_in(&mut tx, id).await?;
    tx.commit().await?;
    Ok(backlog)
}

/// Delete a backlog and everything it holds
pub async fn delete_backlog(db: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = begin_write(db).await?;
    get_backlog_in(&mut tx, id).await?;

    let artifact_ids: Vec<i64> =
        sqlx::query_scalar("SELECT artifact_id FROM backlog_item WHERE backlog_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
    for artifact_id in &artifact_ids {
        backlog_items::remove_item_in(&mut tx, id, *artifact_id).await?;
    }

    sqlx::query("DELETE FROM backlog WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(backlog_id = id, items = artifact_ids.len(), "Deleted backlog");
    Ok(())
}
