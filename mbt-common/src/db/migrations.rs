//! Database schema migrations
//!
//! `create_schema` builds the current layout for new databases; the
//! migrations here bring databases created by earlier releases up to date
//! without data loss.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - users upgrading from older versions depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Stay idempotent** - check `pragma_table_info` before `ALTER TABLE`

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if the schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?",
        table
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// v1: tags gained a display color
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    if !has_column(pool, "tag", "color").await? {
        sqlx::query("ALTER TABLE tag ADD COLUMN color TEXT NOT NULL DEFAULT '#808080'")
            .execute(pool)
            .await?;
        info!("Migration v1: Added color to tag table");
    }
    Ok(())
}

/// v2: seasons and episodes are ordered among their siblings
///
/// Existing children get an index following their id order.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    if !has_column(pool, "artifact", "child_index").await? {
        sqlx::query("ALTER TABLE artifact ADD COLUMN child_index INTEGER")
            .execute(pool)
            .await?;
        info!("Migration v2: Added child_index to artifact table");
    }

    let updated = sqlx::query(
        r#"
        UPDATE artifact
        SET child_index = (
            SELECT COUNT(*) FROM artifact sibling
            WHERE sibling.parent_id = artifact.parent_id AND sibling.id <= artifact.id
        )
        WHERE parent_id IS NOT NULL AND child_index IS NULL
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if updated > 0 {
        info!("Migration v2: Indexed {} child artifacts", updated);
    }
    Ok(())
}
