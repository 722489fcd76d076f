//! Per-user watch/play status of artifacts

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::artifacts::get_artifact_row;
use crate::db::{begin_write, ItemStatus, UserArtifact};
use crate::{users, Error, Result};

const MAX_SCORE: i64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub user_id: i64,
    pub status: ItemStatus,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn validate(update: &StatusUpdate) -> Result<()> {
    if let Some(score) = update.score {
        if !(0..=MAX_SCORE).contains(&score) {
            return Err(Error::InvalidInput(format!(
                "Score must be between 0 and {}, got {}",
                MAX_SCORE, score
            )));
        }
    }
    if let (Some(start), Some(end)) = (update.start_date, update.end_date) {
        if end < start {
            return Err(Error::InvalidInput(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }
    }
    Ok(())
}

/// Insert or replace the user's status for an artifact
pub async fn set_status(
    db: &SqlitePool,
    artifact_id: i64,
    update: &StatusUpdate,
) -> Result<UserArtifact> {
    validate(update)?;

    let mut tx = begin_write(db).await?;
    users::ensure_user_in(&mut tx, update.user_id).await?;
    get_artifact_row(&mut tx, artifact_id).await?;

    let row = sqlx::query_as::<_, UserArtifact>(
        r#"
        INSERT INTO user_artifact (user_id, artifact_id, status, score, start_date, end_date)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, artifact_id) DO UPDATE SET
            status = excluded.status,
            score = excluded.score,
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            updated_at = CURRENT_TIMESTAMP
        RETURNING user_id, artifact_id, status, score, start_date, end_date, updated_at
        "#,
    )
    .bind(update.user_id)
    .bind(artifact_id)
    .bind(update.status)
    .bind(update.score)
    .bind(update.start_date)
    .bind(update.end_date)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(user_id = row.user_id, artifact_id, status = %row.status, "Set artifact status");
    Ok(row)
}

pub async fn get_status(db: &SqlitePool, user_id: i64, artifact_id: i64) -> Result<UserArtifact> {
    sqlx::query_as::<_, UserArtifact>(
        r#"
        SELECT user_id, artifact_id, status, score, start_date, end_date, updated_at
        FROM user_artifact
        WHERE user_id = ? AND artifact_id = ?
        "#,
    )
    .bind(user_id)
    .bind(artifact_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| {
        Error::NotFound(format!(
            "No status for artifact {} and user {}",
            artifact_id, user_id
        ))
    })
}
