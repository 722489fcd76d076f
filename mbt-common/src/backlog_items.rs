//! Items of a backlog: ranked insertion, removal, moves, transfers and ELO fights
//!
//! Every mutation runs in one transaction and leaves the backlog's ranks
//! (and the owner's virtual wishlist ranks) dense.

use chrono::{NaiveDate, NaiveDateTime};
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::artifacts::get_artifact_row;
use crate::backlogs::get_backlog_in;
use crate::db::{begin_write, ArtifactType, Backlog, BacklogItem, BacklogRanking, ItemStatus, Tag, DEFAULT_ELO};
use crate::elo::{self, EloOutcome};
use crate::filters::{ItemFilter, ItemSort};
use crate::ranking::{self, BACKLOG_ITEMS, VIRTUAL_WISHLIST};
use crate::{Error, Result};

const ITEM_COLUMNS: &str = "backlog_id, artifact_id, rank, elo, added_at";

/// One row of a backlog view: item, artifact summary, owner status and tags
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BacklogEntry {
    pub artifact_id: i64,
    pub rank: i64,
    pub elo: i64,
    pub wishlist_rank: Option<i64>,
    pub added_at: NaiveDateTime,
    pub title: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: ArtifactType,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub status: Option<ItemStatus>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

/// Two items to compare next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EloPair {
    pub left: i64,
    pub right: i64,
}

#[derive(sqlx::FromRow)]
struct ItemTagRow {
    artifact_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

async fn fetch_item(
    conn: &mut SqliteConnection,
    backlog_id: i64,
    artifact_id: i64,
) -> Result<Option<BacklogItem>> {
    let sql = format!(
        "SELECT {} FROM backlog_item WHERE backlog_id = ? AND artifact_id = ?",
        ITEM_COLUMNS
    );
    let item = sqlx::query_as::<_, BacklogItem>(&sql)
        .bind(backlog_id)
        .bind(artifact_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

async fn require_item(
    conn: &mut SqliteConnection,
    backlog_id: i64,
    artifact_id: i64,
) -> Result<BacklogItem> {
    fetch_item(conn, backlog_id, artifact_id).await?.ok_or_else(|| {
        Error::NotFound(format!(
            "Artifact {} is not in backlog {}",
            artifact_id, backlog_id
        ))
    })
}

/// Append `artifact_id` to the owner's virtual wishlist unless already ranked
pub async fn register_wishlist(
    conn: &mut SqliteConnection,
    user_id: i64,
    artifact_id: i64,
) -> Result<()> {
    if ranking::rank_of(&mut *conn, VIRTUAL_WISHLIST, user_id, artifact_id)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let rank = ranking::next_rank(&mut *conn, VIRTUAL_WISHLIST, user_id).await?;
    sqlx::query("INSERT INTO virtual_wishlist_rank (user_id, artifact_id, rank) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(artifact_id)
        .bind(rank)
        .execute(&mut *conn)
        .await?;
    debug!(user_id, artifact_id, rank, "Registered wishlist rank");
    Ok(())
}

/// Drop the owner's wishlist rank once no wishlist backlog holds the artifact
pub async fn unregister_wishlist_if_unused(
    conn: &mut SqliteConnection,
    user_id: i64,
    artifact_id: i64,
) -> Result<()> {
    let still_held: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM backlog_item bi
            JOIN backlog b ON b.id = bi.backlog_id
            WHERE b.user_id = ? AND b.ranking = 'wishlist' AND bi.artifact_id = ?
        )
        "#,
    )
    .bind(user_id)
    .bind(artifact_id)
    .fetch_one(&mut *conn)
    .await?;

    if !still_held {
        ranking::remove(&mut *conn, VIRTUAL_WISHLIST, user_id, artifact_id).await?;
    }
    Ok(())
}

/// Insert an item at the end of `backlog`, carrying over an ELO rating
async fn insert_item(
    conn: &mut SqliteConnection,
    backlog: &Backlog,
    artifact_id: i64,
    elo: i64,
) -> Result<BacklogItem> {
    let artifact = get_artifact_row(&mut *conn, artifact_id).await?;
    if !artifact.kind.is_top_level() {
        return Err(Error::InvalidInput(format!(
            "A {} cannot be added to a backlog",
            artifact.kind
        )));
    }
    if artifact.kind != backlog.artifact_type {
        return Err(Error::InvalidInput(format!(
            "Cannot add a {} to a backlog of {} artifacts",
            artifact.kind, backlog.artifact_type
        )));
    }
    if fetch_item(&mut *conn, backlog.id, artifact_id).await?.is_some() {
        return Err(Error::Conflict(format!(
            "Artifact {} is already in backlog {}",
            artifact_id, backlog.id
        )));
    }

    let rank = ranking::next_rank(&mut *conn, BACKLOG_ITEMS, backlog.id).await?;
    let sql = format!(
        "INSERT INTO backlog_item (backlog_id, artifact_id, rank, elo) VALUES (?, ?, ?, ?) RETURNING {}",
        ITEM_COLUMNS
    );
    let item = sqlx::query_as::<_, BacklogItem>(&sql)
        .bind(backlog.id)
        .bind(artifact_id)
        .bind(rank)
        .bind(elo)
        .fetch_one(&mut *conn)
        .await?;

    if backlog.ranking == BacklogRanking::Wishlist {
        register_wishlist(&mut *conn, backlog.user_id, artifact_id).await?;
    }
    Ok(item)
}

/// Append an artifact to a backlog
///
/// The artifact must match the backlog's artifact type; adding it twice is
/// a `Conflict`.
pub async fn add_item(db: &SqlitePool, backlog_id: i64, artifact_id: i64) -> Result<BacklogItem> {
    let mut tx = begin_write(db).await?;
    let backlog = get_backlog_in(&mut tx, backlog_id).await?;
    let item = insert_item(&mut tx, &backlog, artifact_id, DEFAULT_ELO).await?;
    tx.commit().await?;

    info!(backlog_id, artifact_id, rank = item.rank, "Added backlog item");
    Ok(item)
}

/// Remove an item on an existing connection; `false` when absent
///
/// Tags of the item go with it (foreign key cascade).
pub async fn remove_item_in(
    conn: &mut SqliteConnection,
    backlog_id: i64,
    artifact_id: i64,
) -> Result<bool> {
    let backlog = get_backlog_in(&mut *conn, backlog_id).await?;
    let removed = ranking::remove(&mut *conn, BACKLOG_ITEMS, backlog_id, artifact_id).await?;

    if removed && backlog.ranking == BacklogRanking::Wishlist {
        unregister_wishlist_if_unused(&mut *conn, backlog.user_id, artifact_id).await?;
    }
    Ok(removed)
}

pub async fn remove_item(db: &SqlitePool, backlog_id: i64, artifact_id: i64) -> Result<bool> {
    let mut tx = begin_write(db).await?;
    let removed = remove_item_in(&mut tx, backlog_id, artifact_id).await?;
    tx.commit().await?;

    if removed {
        info!(backlog_id, artifact_id, "Removed backlog item");
    } else {
        debug!(backlog_id, artifact_id, "Remove of absent backlog item ignored");
    }
    Ok(removed)
}

/// Move the item at `src_rank` to `target_rank`
///
/// In a wishlist backlog the ranks are the owner's virtual wishlist ranks,
/// and the item at `src_rank` must belong to this backlog.
pub async fn move_item(
    db: &SqlitePool,
    backlog_id: i64,
    src_rank: i64,
    target_rank: i64,
) -> Result<()> {
    let mut tx = begin_write(db).await?;
    let backlog = get_backlog_in(&mut tx, backlog_id).await?;

    match backlog.ranking {
        BacklogRanking::Wishlist => {
            let artifact_id = ranking::item_at(&mut tx, VIRTUAL_WISHLIST, backlog.user_id, src_rank)
                .await?
                .ok_or_else(|| {
                    Error::NotFound(format!("Source item not found at wishlist rank {}", src_rank))
                })?;
            require_item(&mut tx, backlog_id, artifact_id).await?;
            ranking::move_rank(&mut tx, VIRTUAL_WISHLIST, backlog.user_id, src_rank, target_rank)
                .await?;
        }
        BacklogRanking::Rank | BacklogRanking::Elo => {
            ranking::move_rank(&mut tx, BACKLOG_ITEMS, backlog_id, src_rank, target_rank).await?;
        }
    }

    tx.commit().await?;
    info!(backlog_id, src_rank, target_rank, "Moved backlog item");
    Ok(())
}

/// Move an item from one backlog to another of the same owner and type
///
/// The ELO rating and tags travel with the item; it lands at the end of
/// the target backlog.
pub async fn transfer_item(
    db: &SqlitePool,
    backlog_id: i64,
    artifact_id: i64,
    target_backlog_id: i64,
) -> Result<BacklogItem> {
    if backlog_id == target_backlog_id {
        return Err(Error::InvalidInput(
            "Source and target backlog are the same".to_string(),
        ));
    }

    let mut tx = begin_write(db).await?;
    let source = get_backlog_in(&mut tx, backlog_id).await?;
    let target = get_backlog_in(&mut tx, target_backlog_id).await?;

    if source.user_id != target.user_id {
        return Err(Error::InvalidInput(
            "Cannot move item to a backlog of another user".to_string(),
        ));
    }
    if source.artifact_type != target.artifact_type {
        return Err(Error::InvalidInput(
            "Cannot move item to a backlog of a different artifact type".to_string(),
        ));
    }

    let item = require_item(&mut tx, backlog_id, artifact_id).await?;
    let tag_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT tag_id FROM backlog_item_tag WHERE backlog_id = ? AND artifact_id = ?",
    )
    .bind(backlog_id)
    .bind(artifact_id)
    .fetch_all(&mut *tx)
    .await?;

    // Insert before removing so a wishlist-to-wishlist move keeps its rank
    let moved = insert_item(&mut tx, &target, artifact_id, item.elo).await?;
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO backlog_item_tag (backlog_id, artifact_id, tag_id) VALUES (?, ?, ?)")
            .bind(target.id)
            .bind(artifact_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }
    remove_item_in(&mut tx, backlog_id, artifact_id).await?;

    tx.commit().await?;
    info!(
        artifact_id,
        from = backlog_id,
        to = target_backlog_id,
        rank = moved.rank,
        "Transferred backlog item"
    );
    Ok(moved)
}

/// Items of a backlog with artifact data, owner status and tags
pub async fn list_items(
    db: &SqlitePool,
    backlog_id: i64,
    filter: &ItemFilter,
    sort: &ItemSort,
    today: NaiveDate,
) -> Result<Vec<BacklogEntry>> {
    let mut conn = db.acquire().await?;
    let backlog = get_backlog_in(&mut conn, backlog_id).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT bi.artifact_id, bi.rank, bi.elo, vw.rank AS wishlist_rank, bi.added_at,
               a.title, a.type, a.release_date, a.duration, ua.status
        FROM backlog_item bi
        JOIN backlog b ON b.id = bi.backlog_id
        JOIN artifact a ON a.id = bi.artifact_id
        LEFT JOIN virtual_wishlist_rank vw
            ON vw.user_id = b.user_id AND vw.artifact_id = bi.artifact_id
        LEFT JOIN user_artifact ua
            ON ua.user_id = b.user_id AND ua.artifact_id = bi.artifact_id
        WHERE bi.backlog_id = "#,
    );
    qb.push_bind(backlog_id);
    filter.push_conditions(&mut qb, today);
    qb.push(" ORDER BY ").push(sort.order_by(backlog.ranking));

    let mut entries = qb
        .build_query_as::<BacklogEntry>()
        .fetch_all(&mut *conn)
        .await?;

    let tag_rows = sqlx::query_as::<_, ItemTagRow>(
        r#"
        SELECT bit.artifact_id, t.id, t.user_id, t.title, t.color, t.position
        FROM backlog_item_tag bit
        JOIN tag t ON t.id = bit.tag_id
        WHERE bit.backlog_id = ?
        ORDER BY t.position
        "#,
    )
    .bind(backlog_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut tags_by_item: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in tag_rows {
        tags_by_item.entry(row.artifact_id).or_default().push(row.tag);
    }
    for entry in &mut entries {
        entry.tags = tags_by_item.remove(&entry.artifact_id).unwrap_or_default();
    }

    Ok(entries)
}

/// Record that `winner_id` beat `loser_id` and update both ELO ratings
///
/// Both ratings are written in one transaction; a missing side fails the
/// whole fight with `NotFound`.
pub async fn elo_fight(
    db: &SqlitePool,
    backlog_id: i64,
    winner_id: i64,
    loser_id: i64,
) -> Result<EloOutcome> {
    if winner_id == loser_id {
        return Err(Error::InvalidInput(
            "An item cannot fight itself".to_string(),
        ));
    }

    let mut tx = begin_write(db).await?;
    get_backlog_in(&mut tx, backlog_id).await?;
    let winner = require_item(&mut tx, backlog_id, winner_id).await?;
    let loser = require_item(&mut tx, backlog_id, loser_id).await?;

    let outcome = elo::fight(winner.elo, loser.elo);

    for (artifact_id, rating) in [(winner_id, outcome.winner), (loser_id, outcome.loser)] {
        sqlx::query("UPDATE backlog_item SET elo = ? WHERE backlog_id = ? AND artifact_id = ?")
            .bind(rating)
            .bind(backlog_id)
            .bind(artifact_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(
        backlog_id,
        winner_id,
        loser_id,
        winner_elo = outcome.winner,
        loser_elo = outcome.loser,
        "ELO fight recorded"
    );
    Ok(outcome)
}

/// Two distinct random items of the backlog for the next fight
pub async fn elo_pair(db: &SqlitePool, backlog_id: i64) -> Result<EloPair> {
    let mut conn = db.acquire().await?;
    get_backlog_in(&mut conn, backlog_id).await?;

    let ids: Vec<i64> = sqlx::query_scalar("SELECT artifact_id FROM backlog_item WHERE backlog_id = ?")
        .bind(backlog_id)
        .fetch_all(&mut *conn)
        .await?;

    if ids.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "Backlog {} needs at least two items to compare",
            backlog_id
        )));
    }

    let picked = sample(&mut rand::thread_rng(), ids.len(), 2);
    Ok(EloPair {
        left: ids[picked.index(0)],
        right: ids[picked.index(1)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{create_artifact, delete_artifact, NewArtifact};
    use crate::backlogs::{create_backlog, delete_backlog, update_backlog, BacklogUpdate, NewBacklog};
    use crate::db::{init_in_memory, BacklogType};
    use crate::filters::{SortField, SortOrder};
    use crate::tags::{create_tag, tag_item, NewTag};
    use crate::user_artifacts::{set_status, StatusUpdate};
    use crate::users::create_user;

    struct Fixture {
        db: SqlitePool,
        user_id: i64,
        games: Vec<i64>,
    }

    async fn fixture(game_count: usize) -> Fixture {
        let db = init_in_memory().await.unwrap();
        let user_id = create_user(&db, "alice").await.unwrap().id;
        let mut games = Vec::new();
        for i in 0..game_count {
            let game = NewArtifact::new(ArtifactType::Game, format!("Game {}", i + 1));
            games.push(create_artifact(&db, &game).await.unwrap().artifact.id);
        }
        Fixture { db, user_id, games }
    }

    async fn backlog(fx: &Fixture, ranking: BacklogRanking, artifact_type: ArtifactType) -> i64 {
        let new = NewBacklog {
            user_id: fx.user_id,
            title: format!("{} list", ranking),
            kind: BacklogType::Standard,
            ranking,
            artifact_type,
        };
        create_backlog(&fx.db, &new).await.unwrap().id
    }

    async fn ranks(db: &SqlitePool, backlog_id: i64) -> Vec<(i64, i64)> {
        let mut conn = db.acquire().await.unwrap();
        ranking::ranks(&mut conn, BACKLOG_ITEMS, backlog_id).await.unwrap()
    }

    async fn wishlist(db: &SqlitePool, user_id: i64) -> Vec<(i64, i64)> {
        let mut conn = db.acquire().await.unwrap();
        ranking::ranks(&mut conn, VIRTUAL_WISHLIST, user_id).await.unwrap()
    }

    async fn list(db: &SqlitePool, backlog_id: i64) -> Vec<BacklogEntry> {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        list_items(db, backlog_id, &ItemFilter::default(), &ItemSort::default(), today)
            .await
            .unwrap()
    }

    fn ids(entries: &[BacklogEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.artifact_id).collect()
    }

    /// Four games added in this order:
    /// Past (2024-01-15, RPG, 30 min), Today (2024-06-01, Action),
    /// Future (2025-03-01, RPG, 10 min), Unknown (no date, 20 min)
    async fn dated_backlog(fx: &Fixture) -> (i64, Vec<i64>, i64) {
        let id = backlog(fx, BacklogRanking::Rank, ArtifactType::Game).await;
        let specs = [
            ("Past", NaiveDate::from_ymd_opt(2024, 1, 15), "RPG", Some(30)),
            ("Today", NaiveDate::from_ymd_opt(2024, 6, 1), "Action", None),
            ("Future", NaiveDate::from_ymd_opt(2025, 3, 1), "RPG", Some(10)),
            ("Unknown", None, "Action", Some(20)),
        ];

        let mut games = Vec::new();
        let mut rpg = 0;
        for (title, release_date, genre, duration) in specs {
            let mut game = NewArtifact::new(ArtifactType::Game, title);
            game.release_date = release_date;
            game.duration = duration;
            game.genres = vec![genre.to_string()];
            let details = create_artifact(&fx.db, &game).await.unwrap();
            if genre == "RPG" {
                rpg = details.genres[0].id;
            }
            add_item(&fx.db, id, details.artifact.id).await.unwrap();
            games.push(details.artifact.id);
        }
        (id, games, rpg)
    }

    async fn filtered(db: &SqlitePool, backlog_id: i64, filter: ItemFilter) -> Vec<BacklogEntry> {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        list_items(db, backlog_id, &filter, &ItemSort::default(), today)
            .await
            .unwrap()
    }

    async fn sorted(db: &SqlitePool, backlog_id: i64, sort: SortField, order: SortOrder) -> Vec<i64> {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let entries = list_items(db, backlog_id, &ItemFilter::default(), &ItemSort { sort, order }, today)
            .await
            .unwrap();
        ids(&entries)
    }

    #[tokio::test]
    async fn test_add_appends_with_default_elo() {
        let fx = fixture(3).await;
        let id = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;

        for (i, game) in fx.games.iter().enumerate() {
            let item = add_item(&fx.db, id, *game).await.unwrap();
            assert_eq!(item.rank, i as i64 + 1);
            assert_eq!(item.elo, DEFAULT_ELO);
        }
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates_and_wrong_type() {
        let fx = fixture(1).await;
        let id = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        add_item(&fx.db, id, fx.games[0]).await.unwrap();

        let duplicate = add_item(&fx.db, id, fx.games[0]).await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));

        let movie = create_artifact(&fx.db, &NewArtifact::new(ArtifactType::Movie, "Alien"))
            .await
            .unwrap();
        let wrong_type = add_item(&fx.db, id, movie.artifact.id).await;
        assert!(matches!(wrong_type, Err(Error::InvalidInput(_))));

        let missing = add_item(&fx.db, id, 999).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        assert_eq!(ranks(&fx.db, id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_shifts_ranks_above() {
        let fx = fixture(4).await;
        let id = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }

        assert!(remove_item(&fx.db, id, fx.games[1]).await.unwrap());
        assert!(!remove_item(&fx.db, id, fx.games[1]).await.unwrap());

        assert_eq!(
            ranks(&fx.db, id).await,
            vec![(fx.games[0], 1), (fx.games[2], 2), (fx.games[3], 3)]
        );
    }

    #[tokio::test]
    async fn test_move_rank_two_to_four() {
        let fx = fixture(4).await;
        let id = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }

        move_item(&fx.db, id, 2, 4).await.unwrap();

        assert_eq!(
            ranks(&fx.db, id).await,
            vec![(fx.games[0], 1), (fx.games[2], 2), (fx.games[3], 3), (fx.games[1], 4)]
        );

        let missing = move_item(&fx.db, id, 9, 1).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_elo_fight_updates_both_sides() {
        let fx = fixture(2).await;
        let id = backlog(&fx, BacklogRanking::Elo, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }

        let outcome = elo_fight(&fx.db, id, fx.games[1], fx.games[0]).await.unwrap();
        assert_eq!(outcome, EloOutcome { winner: 1216, loser: 1184 });

        // Elo backlogs list highest rating first
        let entries = list(&fx.db, id).await;
        assert_eq!(entries[0].artifact_id, fx.games[1]);
        assert_eq!(entries[0].elo, 1216);
        assert_eq!(entries[1].elo, 1184);
    }

    #[tokio::test]
    async fn test_elo_fight_missing_side_changes_nothing() {
        let fx = fixture(1).await;
        let id = backlog(&fx, BacklogRanking::Elo, ArtifactType::Game).await;
        add_item(&fx.db, id, fx.games[0]).await.unwrap();

        let result = elo_fight(&fx.db, id, fx.games[0], 999).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let same = elo_fight(&fx.db, id, fx.games[0], fx.games[0]).await;
        assert!(matches!(same, Err(Error::InvalidInput(_))));

        assert_eq!(list(&fx.db, id).await[0].elo, DEFAULT_ELO);
    }

    #[tokio::test]
    async fn test_elo_pair_distinct() {
        let fx = fixture(3).await;
        let id = backlog(&fx, BacklogRanking::Elo, ArtifactType::Game).await;
        add_item(&fx.db, id, fx.games[0]).await.unwrap();
        assert!(matches!(elo_pair(&fx.db, id).await, Err(Error::InvalidInput(_))));

        for game in &fx.games[1..] {
            add_item(&fx.db, id, *game).await.unwrap();
        }
        for _ in 0..20 {
            let pair = elo_pair(&fx.db, id).await.unwrap();
            assert_ne!(pair.left, pair.right);
            assert!(fx.games.contains(&pair.left) && fx.games.contains(&pair.right));
        }
    }

    #[tokio::test]
    async fn test_transfer_between_backlogs() {
        let fx = fixture(3).await;
        let from = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        let to = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, from, *game).await.unwrap();
        }
        add_item(&fx.db, to, fx.games[2]).await.unwrap();

        let moved = transfer_item(&fx.db, from, fx.games[0], to).await.unwrap();
        assert_eq!(moved.rank, 2);
        assert_eq!(ranks(&fx.db, from).await, vec![(fx.games[1], 1), (fx.games[2], 2)]);

        let duplicate = transfer_item(&fx.db, from, fx.games[2], to).await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
        // Failed transfer leaves the source untouched
        assert_eq!(ranks(&fx.db, from).await.len(), 2);

        let movies = backlog(&fx, BacklogRanking::Rank, ArtifactType::Movie).await;
        let cross_type = transfer_item(&fx.db, from, fx.games[1], movies).await;
        assert!(matches!(cross_type, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_transfer_carries_elo_and_tags() {
        let fx = fixture(2).await;
        let from = backlog(&fx, BacklogRanking::Elo, ArtifactType::Game).await;
        let to = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, from, *game).await.unwrap();
        }
        elo_fight(&fx.db, from, fx.games[0], fx.games[1]).await.unwrap();

        let mut tag_ids = Vec::new();
        for title in ["coop", "short"] {
            let new = NewTag {
                user_id: fx.user_id,
                title: title.to_string(),
                color: None,
            };
            let tag = create_tag(&fx.db, &new).await.unwrap();
            tag_item(&fx.db, from, fx.games[0], tag.id).await.unwrap();
            tag_ids.push(tag.id);
        }

        let moved = transfer_item(&fx.db, from, fx.games[0], to).await.unwrap();
        assert_eq!(moved.elo, 1216);
        assert_eq!(moved.rank, 1);

        let target = list(&fx.db, to).await;
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].elo, 1216);
        let carried: Vec<i64> = target[0].tags.iter().map(|t| t.id).collect();
        assert_eq!(carried, tag_ids);

        let source = list(&fx.db, from).await;
        assert_eq!(ids(&source), vec![fx.games[1]]);
        assert_eq!(source[0].rank, 1);
        let left_behind: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM backlog_item_tag WHERE backlog_id = ?")
                .bind(from)
                .fetch_one(&fx.db)
                .await
                .unwrap();
        assert_eq!(left_behind, 0);
    }

    #[tokio::test]
    async fn test_transfer_between_wishlists_keeps_wishlist_rank() {
        let fx = fixture(3).await;
        let first = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;
        let second = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;
        let ranked = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, first, *game).await.unwrap();
        }

        transfer_item(&fx.db, first, fx.games[1], second).await.unwrap();
        assert_eq!(
            wishlist(&fx.db, fx.user_id).await,
            vec![(fx.games[0], 1), (fx.games[1], 2), (fx.games[2], 3)]
        );
        assert_eq!(list(&fx.db, second).await[0].wishlist_rank, Some(2));

        // Leaving the last wishlist backlog drops the wishlist rank
        transfer_item(&fx.db, first, fx.games[0], ranked).await.unwrap();
        assert_eq!(
            wishlist(&fx.db, fx.user_id).await,
            vec![(fx.games[1], 1), (fx.games[2], 2)]
        );
        assert_eq!(list(&fx.db, ranked).await[0].wishlist_rank, None);
    }

    #[tokio::test]
    async fn test_wishlist_ranks_follow_membership() {
        let fx = fixture(3).await;
        let first = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;
        let second = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;

        add_item(&fx.db, first, fx.games[0]).await.unwrap();
        add_item(&fx.db, second, fx.games[1]).await.unwrap();
        add_item(&fx.db, first, fx.games[2]).await.unwrap();
        // Already ranked: no second wishlist row
        add_item(&fx.db, second, fx.games[0]).await.unwrap();

        assert_eq!(
            wishlist(&fx.db, fx.user_id).await,
            vec![(fx.games[0], 1), (fx.games[1], 2), (fx.games[2], 3)]
        );

        // Still held by `second`
        remove_item(&fx.db, first, fx.games[0]).await.unwrap();
        assert_eq!(wishlist(&fx.db, fx.user_id).await.len(), 3);

        remove_item(&fx.db, second, fx.games[0]).await.unwrap();
        assert_eq!(
            wishlist(&fx.db, fx.user_id).await,
            vec![(fx.games[1], 1), (fx.games[2], 2)]
        );
    }

    #[tokio::test]
    async fn test_wishlist_move_and_order() {
        let fx = fixture(3).await;
        let id = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }

        move_item(&fx.db, id, 3, 1).await.unwrap();

        let order: Vec<i64> = list(&fx.db, id).await.iter().map(|e| e.artifact_id).collect();
        assert_eq!(order, vec![fx.games[2], fx.games[0], fx.games[1]]);
        // Backlog ranks are untouched by wishlist moves
        assert_eq!(ranks(&fx.db, id).await[0], (fx.games[0], 1));
    }

    #[tokio::test]
    async fn test_ranking_change_registers_wishlist() {
        let fx = fixture(2).await;
        let id = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }
        assert!(wishlist(&fx.db, fx.user_id).await.is_empty());

        let to_wishlist = BacklogUpdate {
            ranking: Some(BacklogRanking::Wishlist),
            ..Default::default()
        };
        update_backlog(&fx.db, id, &to_wishlist).await.unwrap();
        assert_eq!(wishlist(&fx.db, fx.user_id).await.len(), 2);

        let back = BacklogUpdate {
            ranking: Some(BacklogRanking::Rank),
            ..Default::default()
        };
        update_backlog(&fx.db, id, &back).await.unwrap();
        assert!(wishlist(&fx.db, fx.user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_artifact_closes_gaps() {
        let fx = fixture(3).await;
        let ranked = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        let wished = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, ranked, *game).await.unwrap();
            add_item(&fx.db, wished, *game).await.unwrap();
        }

        delete_artifact(&fx.db, fx.games[0]).await.unwrap();

        assert_eq!(ranks(&fx.db, ranked).await, vec![(fx.games[1], 1), (fx.games[2], 2)]);
        assert_eq!(
            wishlist(&fx.db, fx.user_id).await,
            vec![(fx.games[1], 1), (fx.games[2], 2)]
        );
    }

    #[tokio::test]
    async fn test_delete_backlog_clears_wishlist() {
        let fx = fixture(2).await;
        let id = backlog(&fx, BacklogRanking::Wishlist, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }

        delete_backlog(&fx.db, id).await.unwrap();
        assert!(wishlist(&fx.db, fx.user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_title() {
        let fx = fixture(3).await;
        let id = backlog(&fx, BacklogRanking::Rank, ArtifactType::Game).await;
        for game in &fx.games {
            add_item(&fx.db, id, *game).await.unwrap();
        }

        let filter = ItemFilter {
            q: Some("game 2".to_string()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let entries = list_items(&fx.db, id, &filter, &ItemSort::default(), today)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Game 2");
        assert_eq!(entries[0].status, None);
        assert!(entries[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_genre_release_and_status() {
        let fx = fixture(0).await;
        let (id, games, rpg) = dated_backlog(&fx).await;

        let by_genre = filtered(&fx.db, id, ItemFilter {
            genre_id: Some(rpg),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(&by_genre), vec![games[0], games[2]]);

        // Released on or before today
        let released = filtered(&fx.db, id, ItemFilter {
            released: Some(true),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(&released), vec![games[0], games[1]]);

        let unreleased = filtered(&fx.db, id, ItemFilter {
            released: Some(false),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(&unreleased), vec![games[2], games[3]]);

        let upcoming_rpg = filtered(&fx.db, id, ItemFilter {
            genre_id: Some(rpg),
            released: Some(false),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(&upcoming_rpg), vec![games[2]]);

        for (game, status) in [(games[0], ItemStatus::Ongoing), (games[2], ItemStatus::Finished)] {
            let update = StatusUpdate {
                user_id: fx.user_id,
                status,
                score: None,
                start_date: None,
                end_date: None,
            };
            set_status(&fx.db, game, &update).await.unwrap();
        }
        let ongoing = filtered(&fx.db, id, ItemFilter {
            status: Some(ItemStatus::Ongoing),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(&ongoing), vec![games[0]]);
        assert_eq!(ongoing[0].status, Some(ItemStatus::Ongoing));

        let none = filtered(&fx.db, id, ItemFilter {
            status: Some(ItemStatus::Abandoned),
            ..Default::default()
        })
        .await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_list_explicit_sorts() {
        let fx = fixture(0).await;
        let (id, games, _) = dated_backlog(&fx).await;
        let [past, today, future, unknown] = [games[0], games[1], games[2], games[3]];

        assert_eq!(
            sorted(&fx.db, id, SortField::Title, SortOrder::Desc).await,
            vec![unknown, today, past, future]
        );
        assert_eq!(
            sorted(&fx.db, id, SortField::Title, SortOrder::Asc).await,
            vec![future, past, today, unknown]
        );
        // Missing dates and durations go last in both directions
        assert_eq!(
            sorted(&fx.db, id, SortField::ReleaseDate, SortOrder::Asc).await,
            vec![past, today, future, unknown]
        );
        assert_eq!(
            sorted(&fx.db, id, SortField::ReleaseDate, SortOrder::Desc).await,
            vec![future, today, past, unknown]
        );
        assert_eq!(
            sorted(&fx.db, id, SortField::Duration, SortOrder::Asc).await,
            vec![future, unknown, past, today]
        );
        assert_eq!(
            sorted(&fx.db, id, SortField::Rank, SortOrder::Desc).await,
            vec![unknown, future, today, past]
        );

        elo_fight(&fx.db, id, future, past).await.unwrap();
        let by_elo = sorted(&fx.db, id, SortField::Elo, SortOrder::Asc).await;
        assert_eq!(by_elo[0], past);
        assert_eq!(by_elo[3], future);
    }
}
