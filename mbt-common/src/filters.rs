//! Filtering and sorting of backlog item lists
//!
//! Both compile into fragments of a `QueryBuilder` over the item list query
//! in `backlog_items`, which aliases its tables as `bi` (backlog_item), `a`
//! (artifact), `vw` (virtual_wishlist_rank) and `ua` (user_artifact).

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::{BacklogRanking, ItemStatus};

/// Row filters for a backlog's item list; unset fields match everything
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ItemFilter {
    /// Case-insensitive title substring
    pub q: Option<String>,
    pub genre_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub status: Option<ItemStatus>,
    /// `true`: release date known and not in the future
    pub released: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// The backlog's own ordering (rank, ELO or wishlist rank)
    #[default]
    Natural,
    Rank,
    Elo,
    Title,
    ReleaseDate,
    Duration,
    AddedAt,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct ItemSort {
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl ItemFilter {
    /// Append ` AND ...` conditions for every set field
    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>, today: NaiveDate) {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            qb.push(" AND a.title LIKE ")
                .push_bind(format!("%{}%", q))
                .push(" COLLATE NOCASE");
        }

        if let Some(genre_id) = self.genre_id {
            qb.push(" AND EXISTS (SELECT 1 FROM artifact_genre ag WHERE ag.artifact_id = a.id AND ag.genre_id = ")
                .push_bind(genre_id)
                .push(")");
        }

        if let Some(tag_id) = self.tag_id {
            qb.push(
                " AND EXISTS (SELECT 1 FROM backlog_item_tag t \
                 WHERE t.backlog_id = bi.backlog_id AND t.artifact_id = bi.artifact_id AND t.tag_id = ",
            )
            .push_bind(tag_id)
            .push(")");
        }

        if let Some(status) = self.status {
            qb.push(" AND ua.status = ").push_bind(status.as_str());
        }

        match self.released {
            Some(true) => {
                qb.push(" AND a.release_date IS NOT NULL AND a.release_date <= ")
                    .push_bind(today);
            }
            Some(false) => {
                qb.push(" AND (a.release_date IS NULL OR a.release_date > ")
                    .push_bind(today)
                    .push(")");
            }
            None => {}
        }
    }
}

impl ItemSort {
    /// `ORDER BY` clause body for a backlog with the given ranking mode
    ///
    /// Always ends on `bi.rank` so that ties keep a stable order.
    pub fn order_by(&self, ranking: BacklogRanking) -> String {
        let (asc, desc) = ("ASC", "DESC");
        let (forward, backward) = match self.order {
            SortOrder::Asc => (asc, desc),
            SortOrder::Desc => (desc, asc),
        };

        let primary = match self.sort {
            SortField::Natural => match ranking {
                BacklogRanking::Rank => return format!("bi.rank {}", forward),
                BacklogRanking::Elo => format!("bi.elo {}", backward),
                BacklogRanking::Wishlist => format!("vw.rank IS NULL, vw.rank {}", forward),
            },
            SortField::Rank => return format!("bi.rank {}", forward),
            SortField::Elo => format!("bi.elo {}", forward),
            SortField::Title => format!("a.title COLLATE NOCASE {}", forward),
            SortField::ReleaseDate => format!("a.release_date IS NULL, a.release_date {}", forward),
            SortField::Duration => format!("a.duration IS NULL, a.duration {}", forward),
            SortField::AddedAt => format!("bi.added_at {}", forward),
        };

        format!("{}, bi.rank {}", primary, forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_empty_filter_adds_nothing() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1 WHERE 1 = 1");
        ItemFilter::default().push_conditions(&mut qb, today());
        assert_eq!(qb.sql(), "SELECT 1 WHERE 1 = 1");
    }

    #[test]
    fn test_filter_conditions() {
        let mut qb = QueryBuilder::<Sqlite>::new("WHERE 1 = 1");
        let filter = ItemFilter {
            q: Some("  zelda ".to_string()),
            tag_id: Some(4),
            status: Some(ItemStatus::Ongoing),
            released: Some(true),
            ..Default::default()
        };
        filter.push_conditions(&mut qb, today());

        let sql = qb.sql();
        assert!(sql.contains("a.title LIKE ? COLLATE NOCASE"));
        assert!(sql.contains("t.tag_id = ?)"));
        assert!(sql.contains("ua.status = ?"));
        assert!(sql.contains("a.release_date <= ?"));
        assert!(!sql.contains("artifact_genre"));
    }

    #[test]
    fn test_blank_search_ignored() {
        let mut qb = QueryBuilder::<Sqlite>::new("");
        ItemFilter {
            q: Some("   ".to_string()),
            ..Default::default()
        }
        .push_conditions(&mut qb, today());
        assert_eq!(qb.sql(), "");
    }

    #[test]
    fn test_natural_order_follows_ranking() {
        let sort = ItemSort::default();
        assert_eq!(sort.order_by(BacklogRanking::Rank), "bi.rank ASC");
        assert_eq!(sort.order_by(BacklogRanking::Elo), "bi.elo DESC, bi.rank ASC");
        assert_eq!(
            sort.order_by(BacklogRanking::Wishlist),
            "vw.rank IS NULL, vw.rank ASC, bi.rank ASC"
        );
    }

    #[test]
    fn test_explicit_sort() {
        let sort = ItemSort {
            sort: SortField::ReleaseDate,
            order: SortOrder::Desc,
        };
        assert_eq!(
            sort.order_by(BacklogRanking::Rank),
            "a.release_date IS NULL, a.release_date DESC, bi.rank DESC"
        );
    }
}
