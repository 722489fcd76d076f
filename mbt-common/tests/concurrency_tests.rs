//! Concurrent writers against an on-disk database
//!
//! Many requests mutating the same backlog at once must all succeed and
//! leave ranks dense, with no "database is locked" failures.

use mbt_common::artifacts::{create_artifact, NewArtifact};
use mbt_common::backlog_items::add_item;
use mbt_common::backlogs::{create_backlog, NewBacklog};
use mbt_common::db::{init_database, ArtifactType, BacklogRanking, BacklogType};
use mbt_common::tags::{create_tag, list_tags, NewTag};
use mbt_common::users::create_user;
use mbt_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

const WRITERS: usize = 40;

async fn setup() -> (TempDir, SqlitePool, i64) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("backlog.db")).await.unwrap();
    let user_id = create_user(&pool, "alice").await.unwrap().id;
    (dir, pool, user_id)
}

async fn item_ranks(pool: &SqlitePool, backlog_id: i64) -> Vec<i64> {
    sqlx::query_scalar("SELECT rank FROM backlog_item WHERE backlog_id = ? ORDER BY rank")
        .bind(backlog_id)
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_keep_ranks_dense() {
    let (_dir, pool, user_id) = setup().await;

    for ranking in [BacklogRanking::Rank, BacklogRanking::Wishlist] {
        let backlog_id = create_backlog(
            &pool,
            &NewBacklog {
                user_id,
                title: format!("{} queue", ranking),
                kind: BacklogType::Standard,
                ranking,
                artifact_type: ArtifactType::Game,
            },
        )
        .await
        .unwrap()
        .id;

        let mut games = Vec::new();
        for i in 0..WRITERS {
            let title = format!("{} game {}", ranking, i);
            let details = create_artifact(&pool, &NewArtifact::new(ArtifactType::Game, title))
                .await
                .unwrap();
            games.push(details.artifact.id);
        }

        let handles: Vec<_> = games
            .into_iter()
            .map(|game| {
                let pool = pool.clone();
                tokio::spawn(async move { add_item(&pool, backlog_id, game).await })
            })
            .collect();

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                failures.push(e.to_string());
            }
        }
        assert!(failures.is_empty(), "Concurrent adds failed: {:?}", failures);

        let expected: Vec<i64> = (1..=WRITERS as i64).collect();
        assert_eq!(item_ranks(&pool, backlog_id).await, expected);
    }

    let wishlist: Vec<i64> =
        sqlx::query_scalar("SELECT rank FROM virtual_wishlist_rank WHERE user_id = ? ORDER BY rank")
            .bind(user_id)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(wishlist, (1..=WRITERS as i64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_username_conflicts_once() {
    let (_dir, pool, _) = setup().await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { create_user(&pool, "bob").await })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(Error::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tag_creation_positions() {
    let (_dir, pool, user_id) = setup().await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let new = NewTag {
                    user_id,
                    title: format!("tag {}", i),
                    color: None,
                };
                create_tag(&pool, &new).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let positions: Vec<i64> = list_tags(&pool, user_id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.position)
        .collect();
    assert_eq!(positions, (1..=20).collect::<Vec<_>>());
}
