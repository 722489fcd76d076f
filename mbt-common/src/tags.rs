//! User-owned tags and their association with backlog items
//!
//! Tags of a user keep a dense `position` used for display order.

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::backlogs::get_backlog_in;
use crate::db::{begin_write, Tag};
use crate::ranking::{self, TAGS};
use crate::{users, Error, Result};

const TAG_COLUMNS: &str = "id, user_id, title, color, position";

/// Color given to tags created without one
pub const DEFAULT_TAG_COLOR: &str = "#808080";

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    pub title: Option<String>,
    pub color: Option<String>,
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Tag title must not be empty".to_string()));
    }
    Ok(())
}

/// Colors are `#rrggbb`
fn validate_color(color: &str) -> Result<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(Error::InvalidInput(format!("Invalid tag color: {}", color)));
    }
    Ok(())
}

async fn fetch_tag(conn: &mut SqliteConnection, id: i64) -> Result<Tag> {
    let sql = format!("SELECT {} FROM tag WHERE id = ?", TAG_COLUMNS);
    sqlx::query_as::<_, Tag>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Tag not found: {}", id)))
}

/// Create a tag at the end of the user's tag list
pub async fn create_tag(db: &SqlitePool, new: &NewTag) -> Result<Tag> {
    validate_title(&new.title)?;
    let color = new.color.as_deref().unwrap_or(DEFAULT_TAG_COLOR);
    validate_color(color)?;

    let mut tx = begin_write(db).await?;
    users::ensure_user_in(&mut tx, new.user_id).await?;
    let position = ranking::next_rank(&mut tx, TAGS, new.user_id).await?;
    let sql = format!(
        "INSERT INTO tag (user_id, title, color, position) VALUES (?, ?, ?, ?) RETURNING {}",
        TAG_COLUMNS
    );
    let tag = sqlx::query_as::<_, Tag>(&sql)
        .bind(new.user_id)
        .bind(new.title.trim())
        .bind(color)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(tag_id = tag.id, user_id = tag.user_id, position, "Created tag '{}'", tag.title);
    Ok(tag)
}

/// Tags of a user in position order
pub async fn list_tags(db: &SqlitePool, user_id: i64) -> Result<Vec<Tag>> {
    users::ensure_user(db, user_id).await?;

    let sql = format!(
        "SELECT {} FROM tag WHERE user_id = ? ORDER BY position",
        TAG_COLUMNS
    );
    let tags = sqlx::query_as::<_, Tag>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(tags)
}

pub async fn update_tag(db: &SqlitePool, id: i64, update: &TagUpdate) -> Result<Tag> {
    let mut tx = begin_write(db).await?;
    let current = fetch_tag(&mut tx, id).await?;

    let title = update.title.as_deref().unwrap_or(&current.title).trim().to_string();
    validate_title(&title)?;
    let color = update.color.as_deref().unwrap_or(&current.color).to_string();
    validate_color(&color)?;

    sqlx::query("UPDATE tag SET title = ?, color = ? WHERE id = ?")
        .bind(&title)
        .bind(&color)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let tag = fetch_tag(&mut tx, id).await?;
    tx.commit().await?;

    info!(tag_id = id, "Updated tag");
    Ok(tag)
}

/// Delete a tag, closing the gap in its owner's positions
///
/// Item associations cascade with the row.
pub async fn delete_tag(db: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = begin_write(db).await?;
    let tag = fetch_tag(&mut tx, id).await?;
    ranking::remove(&mut tx, TAGS, tag.user_id, id).await?;
    tx.commit().await?;

    info!(tag_id = id, user_id = tag.user_id, "Deleted tag");
    Ok(())
}

/// Move the user's tag at `src_position` to `target_position`
pub async fn move_tag(
    db: &SqlitePool,
    user_id: i64,
    src_position: i64,
    target_position: i64,
) -> Result<()> {
    let mut tx = begin_write(db).await?;
    ranking::move_rank(&mut tx, TAGS, user_id, src_position, target_position).await?;
    tx.commit().await?;

    info!(user_id, src_position, target_position, "Moved tag");
    Ok(())
}

/// Attach a tag to a backlog item; tagging twice is a no-op
pub async fn tag_item(db: &SqlitePool, backlog_id: i64, artifact_id: i64, tag_id: i64) -> Result<()> {
    let mut tx = begin_write(db).await?;
    let backlog = get_backlog_in(&mut tx, backlog_id).await?;
    let tag = fetch_tag(&mut tx, tag_id).await?;
    if tag.user_id != backlog.user_id {
        return Err(Error::InvalidInput(format!(
            "Tag {} does not belong to the owner of backlog {}",
            tag_id, backlog_id
        )));
    }

    let in_backlog: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM backlog_item WHERE backlog_id = ? AND artifact_id = ?)",
    )
    .bind(backlog_id)
    .bind(artifact_id)
    .fetch_one(&mut *tx)
    .await?;
    if !in_backlog {
        return Err(Error::NotFound(format!(
            "Artifact {} is not in backlog {}",
            artifact_id, backlog_id
        )));
    }

    sqlx::query(
        "INSERT OR IGNORE INTO backlog_item_tag (backlog_id, artifact_id, tag_id) VALUES (?, ?, ?)",
    )
    .bind(backlog_id)
    .bind(artifact_id)
    .bind(tag_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(backlog_id, artifact_id, tag_id, "Tagged backlog item");
    Ok(())
}

/// Detach a tag from a backlog item; `false` when it was not attached
pub async fn untag_item(
    db: &SqlitePool,
    backlog_id: i64,
    artifact_id: i64,
    tag_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM backlog_item_tag WHERE backlog_id = ? AND artifact_id = ? AND tag_id = ?",
    )
    .bind(backlog_id)
    .bind(artifact_id)
    .bind(tag_id)
    .execute(db)
    .await?;

    let removed = result.rows_affected() > 0;
    if removed {
        info!(backlog_id, artifact_id, tag_id, "Untagged backlog item");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{create_artifact, NewArtifact};
    use crate::backlog_items::add_item;
    use crate::backlogs::{create_backlog, NewBacklog};
    use crate::db::{init_in_memory, ArtifactType, BacklogRanking, BacklogType};
    use crate::users::create_user;

    fn new_tag(user_id: i64, title: &str) -> NewTag {
        NewTag {
            user_id,
            title: title.to_string(),
            color: None,
        }
    }

    async fn titles(db: &SqlitePool, user_id: i64) -> Vec<String> {
        list_tags(db, user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect()
    }

    #[tokio::test]
    async fn test_create_appends_positions() {
        let db = init_in_memory().await.unwrap();
        let user_id = create_user(&db, "alice").await.unwrap().id;

        for (i, title) in ["coop", "short", "retro"].iter().enumerate() {
            let tag = create_tag(&db, &new_tag(user_id, title)).await.unwrap();
            assert_eq!(tag.position, i as i64 + 1);
            assert_eq!(tag.color, DEFAULT_TAG_COLOR);
        }

        let missing_user = create_tag(&db, &new_tag(999, "x")).await;
        assert!(matches!(missing_user, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_validates_color() {
        let db = init_in_memory().await.unwrap();
        let user_id = create_user(&db, "alice").await.unwrap().id;
        let tag = create_tag(&db, &new_tag(user_id, "coop")).await.unwrap();

        let update = TagUpdate {
            color: Some("#00ff7F".to_string()),
            ..Default::default()
        };
        let updated = update_tag(&db, tag.id, &update).await.unwrap();
        assert_eq!(updated.color, "#00ff7F");
        assert_eq!(updated.title, "coop");

        let bad = TagUpdate {
            color: Some("green".to_string()),
            ..Default::default()
        };
        assert!(matches!(update_tag(&db, tag.id, &bad).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_and_move_keep_positions_dense() {
        let db = init_in_memory().await.unwrap();
        let user_id = create_user(&db, "alice").await.unwrap().id;
        let mut ids = Vec::new();
        for title in ["a", "b", "c", "d"] {
            ids.push(create_tag(&db, &new_tag(user_id, title)).await.unwrap().id);
        }

        delete_tag(&db, ids[1]).await.unwrap();
        assert_eq!(titles(&db, user_id).await, vec!["a", "c", "d"]);

        move_tag(&db, user_id, 3, 1).await.unwrap();
        assert_eq!(titles(&db, user_id).await, vec!["d", "a", "c"]);

        let positions: Vec<i64> = list_tags(&db, user_id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let missing = move_tag(&db, user_id, 7, 1).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tag_and_untag_item() {
        let db = init_in_memory().await.unwrap();
        let alice = create_user(&db, "alice").await.unwrap().id;
        let bob = create_user(&db, "bob").await.unwrap().id;
        let game = create_artifact(&db, &NewArtifact::new(ArtifactType::Game, "Doom"))
            .await
            .unwrap()
            .artifact
            .id;
        let backlog = create_backlog(
            &db,
            &NewBacklog {
                user_id: alice,
                title: "Shooters".to_string(),
                kind: BacklogType::Standard,
                ranking: BacklogRanking::Rank,
                artifact_type: ArtifactType::Game,
            },
        )
        .await
        .unwrap()
        .id;
        add_item(&db, backlog, game).await.unwrap();

        let own = create_tag(&db, &new_tag(alice, "fast")).await.unwrap();
        let foreign = create_tag(&db, &new_tag(bob, "slow")).await.unwrap();

        tag_item(&db, backlog, game, own.id).await.unwrap();
        tag_item(&db, backlog, game, own.id).await.unwrap();

        let wrong_owner = tag_item(&db, backlog, game, foreign.id).await;
        assert!(matches!(wrong_owner, Err(Error::InvalidInput(_))));
        let not_in_backlog = tag_item(&db, backlog, 999, own.id).await;
        assert!(matches!(not_in_backlog, Err(Error::NotFound(_))));

        assert!(untag_item(&db, backlog, game, own.id).await.unwrap());
        assert!(!untag_item(&db, backlog, game, own.id).await.unwrap());
    }
}
