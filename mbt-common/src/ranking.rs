//! Dense rank maintenance for ranked tables
//!
//! Every ranked table keeps, per owner, ranks forming the contiguous
//! sequence 1..N. Insert appends at max + 1, removal closes the gap, and a
//! move shifts the rows between source and target by one before placing the
//! moved row.
//!
//! All functions take a connection rather than the pool so that callers
//! compose them inside one transaction.

use crate::{Error, Result};
use sqlx::SqliteConnection;
use tracing::debug;

/// A ranked table partitioned by an owner column
///
/// Identifiers are compiled-in constants and are spliced into SQL text;
/// owners, items and ranks are always bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankScope {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub item_column: &'static str,
    pub rank_column: &'static str,
}

/// Items of one backlog, ranked manually
pub const BACKLOG_ITEMS: RankScope = RankScope {
    table: "backlog_item",
    owner_column: "backlog_id",
    item_column: "artifact_id",
    rank_column: "rank",
};

/// A user's wishlisted artifacts across every wishlist-ranked backlog
pub const VIRTUAL_WISHLIST: RankScope = RankScope {
    table: "virtual_wishlist_rank",
    owner_column: "user_id",
    item_column: "artifact_id",
    rank_column: "rank",
};

/// A user's tags in display order
pub const TAGS: RankScope = RankScope {
    table: "tag",
    owner_column: "user_id",
    item_column: "id",
    rank_column: "position",
};

/// Rank changes implied by moving one row from `src` to `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// Source and target are the same rank
    Stay,
    /// Every other row with a rank in `from..=to` moves by `delta`,
    /// then the moved row takes `target`
    Shift {
        from: i64,
        to: i64,
        delta: i64,
        target: i64,
    },
}

impl MovePlan {
    pub fn new(src: i64, target: i64) -> Self {
        if src < target {
            // (src, target] slides up by one place
            MovePlan::Shift {
                from: src + 1,
                to: target,
                delta: -1,
                target,
            }
        } else if src > target {
            // [target, src) slides down by one place
            MovePlan::Shift {
                from: target,
                to: src - 1,
                delta: 1,
                target,
            }
        } else {
            MovePlan::Stay
        }
    }

    /// New rank of a row that is not the moved one
    pub fn apply(&self, rank: i64) -> i64 {
        match *self {
            MovePlan::Shift { from, to, delta, .. } if (from..=to).contains(&rank) => rank + delta,
            _ => rank,
        }
    }
}

/// Number of rows held by `owner`
pub async fn count(conn: &mut SqliteConnection, scope: RankScope, owner: i64) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        scope.table, scope.owner_column
    );
    let count: i64 = sqlx::query_scalar(&sql).bind(owner).fetch_one(conn).await?;
    Ok(count)
}

/// Rank to give a row appended at the end (1 when empty)
pub async fn next_rank(conn: &mut SqliteConnection, scope: RankScope, owner: i64) -> Result<i64> {
    let sql = format!(
        "SELECT MAX({}) FROM {} WHERE {} = ?",
        scope.rank_column, scope.table, scope.owner_column
    );
    let max: Option<i64> = sqlx::query_scalar(&sql).bind(owner).fetch_one(conn).await?;
    Ok(max.unwrap_or(0) + 1)
}

/// Current rank of `item`, if present
pub async fn rank_of(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
    item: i64,
) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ? AND {} = ?",
        scope.rank_column, scope.table, scope.owner_column, scope.item_column
    );
    let rank = sqlx::query_scalar(&sql)
        .bind(owner)
        .bind(item)
        .fetch_optional(conn)
        .await?;
    Ok(rank)
}

/// Item sitting at `rank`, if any
pub async fn item_at(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
    rank: i64,
) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ? AND {} = ? LIMIT 1",
        scope.item_column, scope.table, scope.owner_column, scope.rank_column
    );
    let item = sqlx::query_scalar(&sql)
        .bind(owner)
        .bind(rank)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

/// `(item, rank)` pairs of `owner` in rank order
pub async fn ranks(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
) -> Result<Vec<(i64, i64)>> {
    let sql = format!(
        "SELECT {item}, {rank} FROM {table} WHERE {owner} = ? ORDER BY {rank}, {item}",
        item = scope.item_column,
        rank = scope.rank_column,
        table = scope.table,
        owner = scope.owner_column
    );
    let rows = sqlx::query_as::<_, (i64, i64)>(&sql)
        .bind(owner)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Decrement every rank above `removed_rank`
pub async fn close_gap(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
    removed_rank: i64,
) -> Result<u64> {
    let sql = format!(
        "UPDATE {table} SET {rank} = {rank} - 1 WHERE {owner} = ? AND {rank} > ?",
        table = scope.table,
        rank = scope.rank_column,
        owner = scope.owner_column
    );
    let shifted = sqlx::query(&sql)
        .bind(owner)
        .bind(removed_rank)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(shifted)
}

/// Delete `item` and close the gap it leaves
///
/// Returns `false` without touching anything when the row does not exist.
pub async fn remove(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
    item: i64,
) -> Result<bool> {
    let Some(rank) = rank_of(&mut *conn, scope, owner, item).await? else {
        return Ok(false);
    };

    let sql = format!(
        "DELETE FROM {} WHERE {} = ? AND {} = ?",
        scope.table, scope.owner_column, scope.item_column
    );
    sqlx::query(&sql)
        .bind(owner)
        .bind(item)
        .execute(&mut *conn)
        .await?;

    let shifted = close_gap(&mut *conn, scope, owner, rank).await?;
    debug!(table = scope.table, owner, item, rank, shifted, "Removed ranked row");
    Ok(true)
}

/// Move the row at rank `src` to rank `target`
///
/// Fails with `NotFound` when no row sits at `src` and with `InvalidInput`
/// when `target` is outside 1..=N.
pub async fn move_rank(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
    src: i64,
    target: i64,
) -> Result<()> {
    let Some(item) = item_at(&mut *conn, scope, owner, src).await? else {
        return Err(Error::NotFound(format!(
            "Source item not found at rank {} in {} {}",
            src, scope.owner_column, owner
        )));
    };

    let total = count(&mut *conn, scope, owner).await?;
    if target < 1 || target > total {
        return Err(Error::InvalidInput(format!(
            "Target rank {} out of range 1..={}",
            target, total
        )));
    }

    let MovePlan::Shift { from, to, delta, target } = MovePlan::new(src, target) else {
        return Ok(());
    };

    let shift_sql = format!(
        "UPDATE {table} SET {rank} = {rank} + ? WHERE {owner} = ? AND {rank} BETWEEN ? AND ? AND {item} != ?",
        table = scope.table,
        rank = scope.rank_column,
        owner = scope.owner_column,
        item = scope.item_column
    );
    sqlx::query(&shift_sql)
        .bind(delta)
        .bind(owner)
        .bind(from)
        .bind(to)
        .bind(item)
        .execute(&mut *conn)
        .await?;

    let place_sql = format!(
        "UPDATE {} SET {} = ? WHERE {} = ? AND {} = ?",
        scope.table, scope.rank_column, scope.owner_column, scope.item_column
    );
    sqlx::query(&place_sql)
        .bind(target)
        .bind(owner)
        .bind(item)
        .execute(&mut *conn)
        .await?;

    debug!(table = scope.table, owner, item, src, target, "Moved ranked row");
    Ok(())
}

/// Move `item` to rank `target`, wherever it currently sits
pub async fn move_item(
    conn: &mut SqliteConnection,
    scope: RankScope,
    owner: i64,
    item: i64,
    target: i64,
) -> Result<()> {
    let Some(src) = rank_of(&mut *conn, scope, owner, item).await? else {
        return Err(Error::NotFound(format!(
            "Source item {} not found in {} {}",
            item, scope.owner_column, owner
        )));
    };
    move_rank(conn, scope, owner, src, target).await
}

/// Rewrite ranks as 1..N keeping the current order
///
/// Returns the number of rows whose rank changed.
pub async fn normalize(conn: &mut SqliteConnection, scope: RankScope, owner: i64) -> Result<u64> {
    let rows = ranks(&mut *conn, scope, owner).await?;
    let sql = format!(
        "UPDATE {} SET {} = ? WHERE {} = ? AND {} = ?",
        scope.table, scope.rank_column, scope.owner_column, scope.item_column
    );

    let mut changed = 0;
    for (index, (item, rank)) in rows.into_iter().enumerate() {
        let dense = index as i64 + 1;
        if rank != dense {
            sqlx::query(&sql)
                .bind(dense)
                .bind(owner)
                .bind(item)
                .execute(&mut *conn)
                .await?;
            changed += 1;
        }
    }
    Ok(changed)
}
