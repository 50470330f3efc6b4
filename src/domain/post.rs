use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::interaction::{Comment, ErrorCode, ReactionKind};
use crate::domain::user::ActorDisplay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: ActorDisplay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<Uuid>,
    pub description: Option<String>,
    pub media: Vec<MediaItem>,
    pub visibility: PostVisibility,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub counters: PostCounters,
    /// Most recent comments, newest first. Bounded by the preview limit.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// The requesting actor's current reaction, when the feed was fetched
    /// with a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_reaction: Option<ReactionKind>,
}

impl Post {
    pub fn has_media(&self, kind: MediaKind) -> bool {
        self.media.iter().any(|item| item.kind == kind)
    }
}

/// Denormalized aggregates cached on the post row. The detail tables are the
/// source of truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCounters {
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
}

impl PostCounters {
    pub fn popularity(&self) -> i64 {
        self.like_count + self.comment_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostVisibility {
    Public,
    Private,
    Friends,
}

impl PostVisibility {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "friends" => Some(Self::Friends),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Friends => "friends",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsPage {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default)]
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsPage {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}
