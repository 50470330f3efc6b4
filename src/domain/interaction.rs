use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::post::PostCounters;
use crate::domain::user::ActorDisplay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionKind {
    Like,
    Love,
    Wow,
    Sad,
    Angry,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 5] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
    ];

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "love" => Some(Self::Love),
            "wow" => Some(Self::Wow),
            "sad" => Some(Self::Sad),
            "angry" => Some(Self::Angry),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Love => "love",
            Self::Wow => "wow",
            Self::Sad => "sad",
            Self::Angry => "angry",
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Love => "LOVE",
            Self::Wow => "WOW",
            Self::Sad => "SAD",
            Self::Angry => "ANGRY",
        }
    }
}

impl FromStr for ReactionKind {
    type Err = UnknownReactionKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_wire() == value)
            .ok_or_else(|| UnknownReactionKind(value.to_string()))
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownReactionKind(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    Reaction,
    Comment,
    Share,
}

/// A validated interaction. `Reaction(None)` removes the actor's reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Reaction(Option<ReactionKind>),
    Comment(String),
    Share,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Reaction(_) => InteractionKind::Reaction,
            Self::Comment(_) => InteractionKind::Comment,
            Self::Share => InteractionKind::Share,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub post_id: String,
    pub actor_id: Uuid,
    pub kind: ReactionKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: ActorDisplay,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub id: String,
    pub post_id: String,
    pub actor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Body of `POST /interactions`. `reactionKind` stays a raw string so an
/// unknown kind is reported as a validation error rather than a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    pub post_id: String,
    pub kind: InteractionKind,
    #[serde(default)]
    pub reaction_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_text: Option<String>,
}

impl InteractionRequest {
    pub fn reaction(post_id: impl Into<String>, kind: Option<ReactionKind>) -> Self {
        Self {
            post_id: post_id.into(),
            kind: InteractionKind::Reaction,
            reaction_kind: kind.map(|kind| kind.as_wire().to_string()),
            comment_text: None,
        }
    }

    pub fn comment(post_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            kind: InteractionKind::Comment,
            reaction_kind: None,
            comment_text: Some(text.into()),
        }
    }

    pub fn share(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            kind: InteractionKind::Share,
            reaction_kind: None,
            comment_text: None,
        }
    }
}

/// Machine-readable failure reason carried by every `ok: false` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    PostNotFound,
    DuplicateReaction,
    ReactionNotFound,
    RateLimited,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Authorization,
    Conflict,
    Transient,
}

impl ErrorCode {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation | Self::PostNotFound => ErrorClass::Validation,
            Self::Unauthorized => ErrorClass::Authorization,
            Self::DuplicateReaction | Self::ReactionNotFound => ErrorClass::Conflict,
            Self::RateLimited | Self::Internal => ErrorClass::Transient,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_kind: Option<ReactionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_display_fields: Option<ActorDisplay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<PostCounters>,
}

impl InteractionResponse {
    pub fn success(message: impl Into<String>, counters: PostCounters) -> Self {
        Self {
            ok: true,
            message: message.into(),
            code: None,
            id: None,
            created_at: None,
            reaction_kind: None,
            actor_display_fields: None,
            counters: Some(counters),
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            code: Some(code),
            id: None,
            created_at: None,
            reaction_kind: None,
            actor_display_fields: None,
            counters: None,
        }
    }
}
