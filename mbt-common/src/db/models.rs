//! Database models

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default ELO rating of a newly added backlog item
pub const DEFAULT_ELO: i64 = 1200;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Kind of media an artifact represents
///
/// `Season` and `Episode` only exist as children of a show or anime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ArtifactType {
    Game,
    Movie,
    Tvshow,
    Anime,
    Season,
    Episode,
}

text_enum!(ArtifactType {
    Game => "game",
    Movie => "movie",
    Tvshow => "tvshow",
    Anime => "anime",
    Season => "season",
    Episode => "episode",
});

impl ArtifactType {
    /// Whether artifacts of this type can be put in a backlog
    pub fn is_top_level(self) -> bool {
        !matches!(self, Self::Season | Self::Episode)
    }

    /// Type a child of this artifact must have, if children are allowed
    pub fn child_type(self) -> Option<ArtifactType> {
        match self {
            Self::Tvshow | Self::Anime => Some(Self::Season),
            Self::Season => Some(Self::Episode),
            _ => None,
        }
    }
}

/// Role of a backlog in the user's list collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BacklogType {
    #[default]
    Standard,
    Current,
    Future,
}

text_enum!(BacklogType {
    Standard => "standard",
    Current => "current",
    Future => "future",
});

/// How a backlog orders its items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BacklogRanking {
    /// Manual dense ranks
    #[default]
    Rank,
    /// ELO rating, highest first
    Elo,
    /// The owner's virtual wishlist ranks
    Wishlist,
}

text_enum!(BacklogRanking {
    Rank => "rank",
    Elo => "elo",
    Wishlist => "wishlist",
});

/// Watch/play status of an artifact for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ItemStatus {
    Wishlist,
    Ongoing,
    Finished,
    OnHold,
    Abandoned,
}

text_enum!(ItemStatus {
    Wishlist => "wishlist",
    Ongoing => "ongoing",
    Finished => "finished",
    OnHold => "on_hold",
    Abandoned => "abandoned",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: NaiveDateTime,
}

/// One artifact row (children are loaded separately)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artifact {
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: ArtifactType,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    /// Minutes
    pub duration: Option<i64>,
    pub parent_id: Option<i64>,
    pub child_index: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    pub title: String,
}

/// Score from one rating source, normalized to 0..=100
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub source: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Link {
    pub provider: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Backlog {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: BacklogType,
    pub ranking: BacklogRanking,
    pub title: String,
    pub artifact_type: ArtifactType,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BacklogItem {
    pub backlog_id: i64,
    pub artifact_id: i64,
    pub rank: i64,
    pub elo: i64,
    pub added_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub color: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserArtifact {
    pub user_id: i64,
    pub artifact_id: i64,
    pub status: ItemStatus,
    pub score: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub updated_at: NaiveDateTime,
}
