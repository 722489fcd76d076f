//! Tests for on-disk database initialization
//!
//! Covers automatic creation of a missing database file, reopening an
//! existing one without losing data, and schema version bookkeeping.

use mbt_common::db::{get_schema_version, init_database, CURRENT_SCHEMA_VERSION};
use mbt_common::users::{create_user, get_user};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("backlog.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("backlog.db");

    let pool = init_database(&db_path).await.unwrap();
    let user = create_user(&pool, "alice").await.unwrap();
    pool.close().await;

    // Second open must keep existing rows
    let pool = init_database(&db_path).await.unwrap();
    let fetched = get_user(&pool, user.id).await.unwrap();
    assert_eq!(fetched.username, "alice");
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("backlog.db");

    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_foreign_keys_enabled_on_every_connection() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("backlog.db");
    let pool = init_database(&db_path).await.unwrap();

    // Hold several connections so the check is not limited to the first
    let mut conns = Vec::new();
    for _ in 0..3 {
        conns.push(pool.acquire().await.unwrap());
    }
    for conn in &mut conns {
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
