//! Database initialization
//!
//! Opens (or creates) the SQLite database file, applies connection pragmas
//! and creates every table idempotently before running migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go through the connect options so that every pooled
    // connection gets them, not only the first one.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create an in-memory database with the full schema
///
/// Uses a single connection that never expires: every connection to
/// `sqlite::memory:` is a separate database.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Open a transaction holding the write lock from its first statement
///
/// Concurrent writers wait on the busy timeout here; a deferred transaction
/// upgrading from a stale WAL snapshot would fail with `SQLITE_BUSY` instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    let tx = pool.begin_with("BEGIN IMMEDIATE").await?;
    Ok(tx)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_artifact_tables(pool).await?;
    create_backlog_tables(pool).await?;
    create_tag_tables(pool).await?;
    create_virtual_wishlist_table(pool).await?;
    create_user_artifact_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Artifacts and their genre, rating and link children
async fn create_artifact_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifact (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL
                CHECK (type IN ('game', 'movie', 'tvshow', 'anime', 'season', 'episode')),
            title TEXT NOT NULL,
            release_date TEXT,
            duration INTEGER,
            parent_id INTEGER REFERENCES artifact(id) ON DELETE CASCADE,
            child_index INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifact_parent ON artifact(parent_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genre (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifact_genre (
            artifact_id INTEGER NOT NULL REFERENCES artifact(id) ON DELETE CASCADE,
            genre_id INTEGER NOT NULL REFERENCES genre(id) ON DELETE CASCADE,
            PRIMARY KEY (artifact_id, genre_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rating (
            artifact_id INTEGER NOT NULL REFERENCES artifact(id) ON DELETE CASCADE,
            source TEXT NOT NULL,
            score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
            PRIMARY KEY (artifact_id, source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS link (
            artifact_id INTEGER NOT NULL REFERENCES artifact(id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            url TEXT NOT NULL,
            PRIMARY KEY (artifact_id, provider)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Backlogs and their ranked items
///
/// No UNIQUE constraint on (backlog_id, rank): range shifts update rows one
/// at a time and would trip it mid-statement.
async fn create_backlog_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backlog (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            type TEXT NOT NULL DEFAULT 'standard'
                CHECK (type IN ('standard', 'current', 'future')),
            ranking TEXT NOT NULL DEFAULT 'rank'
                CHECK (ranking IN ('rank', 'elo', 'wishlist')),
            title TEXT NOT NULL,
            artifact_type TEXT NOT NULL
                CHECK (artifact_type IN ('game', 'movie', 'tvshow', 'anime')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backlog_item (
            backlog_id INTEGER NOT NULL REFERENCES backlog(id) ON DELETE CASCADE,
            artifact_id INTEGER NOT NULL REFERENCES artifact(id) ON DELETE CASCADE,
            rank INTEGER NOT NULL,
            elo INTEGER NOT NULL DEFAULT 1200,
            added_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (backlog_id, artifact_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_backlog_item_rank ON backlog_item(backlog_id, rank)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tag_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT '#808080',
            position INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backlog_item_tag (
            backlog_id INTEGER NOT NULL,
            artifact_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
            PRIMARY KEY (backlog_id, artifact_id, tag_id),
            FOREIGN KEY (backlog_id, artifact_id)
                REFERENCES backlog_item(backlog_id, artifact_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_virtual_wishlist_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS virtual_wishlist_rank (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            artifact_id INTEGER NOT NULL REFERENCES artifact(id) ON DELETE CASCADE,
            rank INTEGER NOT NULL,
            PRIMARY KEY (user_id, artifact_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_artifact_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_artifact (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            artifact_id INTEGER NOT NULL REFERENCES artifact(id) ON DELETE CASCADE,
            status TEXT NOT NULL
                CHECK (status IN ('wishlist', 'ongoing', 'finished', 'on_hold', 'abandoned')),
            score INTEGER CHECK (score IS NULL OR score BETWEEN 0 AND 10),
            start_date TEXT,
            end_date TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, artifact_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_in_memory().await.unwrap();

        // Running the DDL a second time must not fail
        create_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "artifact",
            "backlog",
            "backlog_item",
            "backlog_item_tag",
            "tag",
            "user_artifact",
            "users",
            "virtual_wishlist_rank",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = init_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO backlog (user_id, title, artifact_type) VALUES (999, 'orphan', 'game')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "backlog without user should be rejected");
    }
}
