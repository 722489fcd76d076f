//! Genres shared by all artifact types

use crate::db::Genre;
use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Return the genre with this title, creating it when missing
pub async fn get_or_create(conn: &mut SqliteConnection, title: &str) -> Result<Genre> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Genre title must not be empty".to_string()));
    }

    sqlx::query("INSERT OR IGNORE INTO genre (title) VALUES (?)")
        .bind(title)
        .execute(&mut *conn)
        .await?;

    let genre = sqlx::query_as::<_, Genre>("SELECT id, title FROM genre WHERE title = ?")
        .bind(title)
        .fetch_one(&mut *conn)
        .await?;
    Ok(genre)
}

pub async fn create_genre(db: &SqlitePool, title: &str) -> Result<Genre> {
    let mut conn = db.acquire().await?;
    get_or_create(&mut conn, title).await
}

pub async fn list_genres(db: &SqlitePool) -> Result<Vec<Genre>> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, title FROM genre ORDER BY title COLLATE NOCASE")
        .fetch_all(db)
        .await?;
    Ok(genres)
}

/// Replace the genres of an artifact
pub async fn set_artifact_genres(
    conn: &mut SqliteConnection,
    artifact_id: i64,
    titles: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM artifact_genre WHERE artifact_id = ?")
        .bind(artifact_id)
        .execute(&mut *conn)
        .await?;

    for title in titles {
        let genre = get_or_create(&mut *conn, title).await?;
        sqlx::query("INSERT OR IGNORE INTO artifact_genre (artifact_id, genre_id) VALUES (?, ?)")
            .bind(artifact_id)
            .bind(genre.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn genres_of(conn: &mut SqliteConnection, artifact_id: i64) -> Result<Vec<Genre>> {
    let genres = sqlx::query_as::<_, Genre>(
        r#"
        SELECT g.id, g.title
        FROM genre g
        JOIN artifact_genre ag ON ag.genre_id = g.id
        WHERE ag.artifact_id = ?
        ORDER BY g.title COLLATE NOCASE
        "#,
    )
    .bind(artifact_id)
    .fetch_all(conn)
    .await?;
    Ok(genres)
}
