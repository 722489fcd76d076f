//! Artifact catalog: games, movies, shows, anime and their seasons/episodes

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use crate::db::{begin_write, Artifact, ArtifactType, Genre, Link, Rating};
use crate::{backlog_items, genres, ranking, Error, Result};

const ARTIFACT_COLUMNS: &str =
    "id, type, title, release_date, duration, parent_id, child_index, created_at";

/// Artifact to create, with optional nested children
#[derive(Debug, Clone, Deserialize)]
pub struct NewArtifact {
    #[serde(rename = "type")]
    pub kind: ArtifactType,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub children: Vec<NewArtifact>,
}

impl NewArtifact {
    pub fn new(kind: ArtifactType, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            release_date: None,
            duration: None,
            genres: Vec::new(),
            ratings: Vec::new(),
            links: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Partial update; `None` leaves the field unchanged
///
/// `release_date` and `duration` are nullable: a JSON `null` arrives as
/// `Some(None)` and clears the column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub release_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub duration: Option<Option<i64>>,
    pub genres: Option<Vec<String>>,
    pub ratings: Option<Vec<Rating>>,
    pub links: Option<Vec<Link>>,
}

/// Wrap any value that is present in the input, `null` included
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Season or episode with its own children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactNode {
    #[serde(flatten)]
    pub artifact: Artifact,
    pub children: Vec<ArtifactNode>,
}

/// Artifact with everything attached to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactDetails {
    #[serde(flatten)]
    pub artifact: Artifact,
    pub genres: Vec<Genre>,
    pub ratings: Vec<Rating>,
    pub links: Vec<Link>,
    pub children: Vec<ArtifactNode>,
}

fn validate_fields(
    title: &str,
    duration: Option<i64>,
    ratings: &[Rating],
    links: &[Link],
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Title must not be empty".to_string()));
    }
    if let Some(d) = duration {
        if d < 0 {
            return Err(Error::InvalidInput(format!("Duration must not be negative: {}", d)));
        }
    }
    if let Some(r) = ratings.iter().find(|r| !(0..=100).contains(&r.score)) {
        return Err(Error::InvalidInput(format!(
            "Rating from {} out of range 0..=100: {}",
            r.source, r.score
        )));
    }
    if let Some(l) = links.iter().find(|l| l.url.trim().is_empty()) {
        return Err(Error::InvalidInput(format!("Empty link for provider {}", l.provider)));
    }
    Ok(())
}

/// Check a whole tree before writing anything
fn validate_tree(root: &NewArtifact) -> Result<()> {
    if !root.kind.is_top_level() {
        return Err(Error::InvalidInput(format!(
            "A {} can only be created inside its parent",
            root.kind
        )));
    }

    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        validate_fields(&node.title, node.duration, &node.ratings, &node.links)?;

        if !node.children.is_empty() {
            let expected = node.kind.child_type().ok_or_else(|| {
                Error::InvalidInput(format!("A {} cannot have children", node.kind))
            })?;
            if let Some(child) = node.children.iter().find(|c| c.kind != expected) {
                return Err(Error::InvalidInput(format!(
                    "Children of a {} must be of type {}, got {}",
                    node.kind, expected, child.kind
                )));
            }
        }
        pending.extend(node.children.iter());
    }
    Ok(())
}

async fn replace_ratings(conn: &mut SqliteConnection, artifact_id: i64, ratings: &[Rating]) -> Result<()> {
    sqlx::query("DELETE FROM rating WHERE artifact_id = ?")
        .bind(artifact_id)
        .execute(&mut *conn)
        .await?;
    for rating in ratings {
        sqlx::query("INSERT OR REPLACE INTO rating (artifact_id, source, score) VALUES (?, ?, ?)")
            .bind(artifact_id)
            .bind(&rating.source)
            .bind(rating.score)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn replace_links(conn: &mut SqliteConnection, artifact_id: i64, links: &[Link]) -> Result<()> {
    sqlx::query("DELETE FROM link WHERE artifact_id = ?")
        .bind(artifact_id)
        .execute(&mut *conn)
        .await?;
    for link in links {
        sqlx::query("INSERT OR REPLACE INTO link (artifact_id, provider, url) VALUES (?, ?, ?)")
            .bind(artifact_id)
            .bind(&link.provider)
            .bind(link.url.trim())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_row(
    conn: &mut SqliteConnection,
    node: &NewArtifact,
    parent_id: Option<i64>,
    child_index: Option<i64>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO artifact (type, title, release_date, duration, parent_id, child_index)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(node.kind)
    .bind(node.title.trim())
    .bind(node.release_date)
    .bind(node.duration)
    .bind(parent_id)
    .bind(child_index)
    .fetch_one(&mut *conn)
    .await?;

    genres::set_artifact_genres(&mut *conn, id, &node.genres).await?;
    replace_ratings(&mut *conn, id, &node.ratings).await?;
    replace_links(&mut *conn, id, &node.links).await?;
    Ok(id)
}

/// Create an artifact and all its children in one transaction
pub async fn create_artifact(db: &SqlitePool, new: &NewArtifact) -> Result<ArtifactDetails> {
    validate_tree(new)?;

    let mut tx = begin_write(db).await?;
    let root_id = insert_row(&mut tx, new, None, None).await?;

    // (parent id, children to insert under it)
    let mut pending: Vec<(i64, &[NewArtifact])> = vec![(root_id, new.children.as_slice())];
    let mut created = 1;
    while let Some((parent_id, children)) = pending.pop() {
        for (index, child) in children.iter().enumerate() {
            let child_id = insert_row(&mut tx, child, Some(parent_id), Some(index as i64 + 1)).await?;
            created += 1;
            if !child.children.is_empty() {
                pending.push((child_id, child.children.as_slice()));
            }
        }
    }

    let details = load_details(&mut tx, root_id).await?;
    tx.commit().await?;

    info!(artifact_id = root_id, created, "Created {} '{}'", new.kind, details.artifact.title);
    Ok(details)
}

async fn fetch_artifact(conn: &mut SqliteConnection, id: i64) -> Result<Artifact> {
    let sql = format!("SELECT {} FROM artifact WHERE id = ?", ARTIFACT_COLUMNS);
    sqlx::query_as::<_, Artifact>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Artifact not found: {}", id)))
}

/// Arrange descendants (any order) into a tree under `root_id`
fn build_tree(root_id: i64, descendants: Vec<Artifact>) -> Vec<ArtifactNode> {
    let mut by_parent: HashMap<i64, Vec<Artifact>> = HashMap::new();
    for artifact in descendants {
        if let Some(parent) = artifact.parent_id {
            by_parent.entry(parent).or_default().push(artifact);
        }
    }

    fn attach(parent: i64, by_parent: &mut HashMap<i64, Vec<Artifact>>) -> Vec<ArtifactNode> {
        let mut children = by_parent.remove(&parent).unwrap_or_default();
        children.sort_by_key(|a| (a.child_index, a.id));
        children
            .into_iter()
            .map(|artifact| ArtifactNode {
                children: attach(artifact.id, by_parent),
                artifact,
            })
            .collect()
    }

    attach(root_id, &mut by_parent)
}

async fn load_details(conn: &mut SqliteConnection, id: i64) -> Result<ArtifactDetails> {
    let artifact = fetch_artifact(&mut *conn, id).await?;

    let sql = format!(
        r#"
        WITH RECURSIVE tree(id) AS (
            SELECT id FROM artifact WHERE parent_id = ?
            UNION ALL
            SELECT a.id FROM artifact a JOIN tree ON a.parent_id = tree.id
        )
        SELECT {} FROM artifact WHERE id IN (SELECT id FROM tree)
        "#,
        ARTIFACT_COLUMNS
    );
    let descendants = sqlx::query_as::<_, Artifact>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    let genres = genres::genres_of(&mut *conn, id).await?;
    let ratings = sqlx::query_as::<_, Rating>(
        "SELECT source, score FROM rating WHERE artifact_id = ? ORDER BY source",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    let links = sqlx::query_as::<_, Link>(
        "SELECT provider, url FROM link WHERE artifact_id = ? ORDER BY provider",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ArtifactDetails {
        children: build_tree(id, descendants),
        artifact,
        genres,
        ratings,
        links,
    })
}

pub async fn get_artifact(db: &SqlitePool, id: i64) -> Result<ArtifactDetails> {
    let mut conn = db.acquire().await?;
    load_details(&mut conn, id).await
}

/// Plain artifact row, without children or attachments
pub async fn get_artifact_row(conn: &mut SqliteConnection, id: i64) -> Result<Artifact> {
    fetch_artifact(conn, id).await
}

fn push_list_conditions<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    kind: Option<ArtifactType>,
    q: Option<&'a str>,
) {
    qb.push(" WHERE parent_id IS NULL");
    if let Some(kind) = kind {
        qb.push(" AND type = ").push_bind(kind.as_str());
    }
    if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
        qb.push(" AND title LIKE ")
            .push_bind(format!("%{}%", q))
            .push(" COLLATE NOCASE");
    }
}

/// Number of top-level artifacts matching the list filters
pub async fn count_artifacts(
    db: &SqlitePool,
    kind: Option<ArtifactType>,
    q: Option<&str>,
) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM artifact");
    push_list_conditions(&mut qb, kind, q);
    let total: i64 = qb.build_query_scalar().fetch_one(db).await?;
    Ok(total)
}

/// One page of top-level artifacts ordered by title
pub async fn list_artifacts(
    db: &SqlitePool,
    kind: Option<ArtifactType>,
    q: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Artifact>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM artifact", ARTIFACT_COLUMNS));
    push_list_conditions(&mut qb, kind, q);
    qb.push(" ORDER BY title COLLATE NOCASE, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build_query_as::<Artifact>().fetch_all(db).await?;
    Ok(rows)
}

pub async fn update_artifact(
    db: &SqlitePool,
    id: i64,
    update: &ArtifactUpdate,
) -> Result<ArtifactDetails> {
    let mut tx = begin_write(db).await?;
    let current = fetch_artifact(&mut tx, id).await?;

    let title = update.title.clone().unwrap_or(current.title);
    let release_date = update.release_date.unwrap_or(current.release_date);
    let duration = update.duration.unwrap_or(current.duration);
    validate_fields(
        &title,
        duration,
        update.ratings.as_deref().unwrap_or_default(),
        update.links.as_deref().unwrap_or_default(),
    )?;

    sqlx::query("UPDATE artifact SET title = ?, release_date = ?, duration = ? WHERE id = ?")
        .bind(title.trim())
        .bind(release_date)
        .bind(duration)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if let Some(genre_titles) = &update.genres {
        genres::set_artifact_genres(&mut tx, id, genre_titles).await?;
    }
    if let Some(ratings) = &update.ratings {
        replace_ratings(&mut tx, id, ratings).await?;
    }
    if let Some(links) = &update.links {
        replace_links(&mut tx, id, links).await?;
    }

    let details = load_details(&mut tx, id).await?;
    tx.commit().await?;

    info!(artifact_id = id, "Updated artifact");
    Ok(details)
}

/// Delete an artifact, taking it out of every backlog first
///
/// Removal goes through the gap-closing path so that the ranks of the
/// backlogs and wishlists it belonged to stay dense.
pub async fn delete_artifact(db: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = begin_write(db).await?;
    fetch_artifact(&mut tx, id).await?;

    let backlog_ids: Vec<i64> =
        sqlx::query_scalar("SELECT backlog_id FROM backlog_item WHERE artifact_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
    for backlog_id in &backlog_ids {
        backlog_items::remove_item_in(&mut tx, *backlog_id, id).await?;
    }

    let wishlist_owners: Vec<i64> =
        sqlx::query_scalar("SELECT user_id FROM virtual_wishlist_rank WHERE artifact_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
    for user_id in wishlist_owners {
        ranking::remove(&mut tx, ranking::VIRTUAL_WISHLIST, user_id, id).await?;
    }

    sqlx::query("DELETE FROM artifact WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(artifact_id = id, backlogs = backlog_ids.len(), "Deleted artifact");
    Ok(())
}
