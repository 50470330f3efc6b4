use sqlx::Row;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::counters::{Counter, CounterStore};
use crate::app::feed::comment_from_row;
use crate::domain::ids::{is_valid_public_id, new_public_id};
use crate::domain::interaction::{
    Comment, ErrorCode, Interaction, InteractionKind, InteractionRequest, InteractionResponse,
    Reaction, ReactionKind, Share,
};
use crate::domain::post::PostCounters;
use crate::infra::db::{Db, PgTx};
use crate::infra::storage::MediaLinks;

pub const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("invalid post id")]
    InvalidPostId,
    #[error("invalid reaction kind: {0}")]
    InvalidReactionKind(String),
    #[error("comment text is required")]
    EmptyComment,
    #[error("comment must be at most {} characters", MAX_COMMENT_CHARS)]
    CommentTooLong,
    #[error("post not found")]
    PostNotFound,
    #[error("you already reacted with this kind")]
    DuplicateReaction,
    #[error("no reaction to remove")]
    ReactionNotFound,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl InteractionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPostId
            | Self::InvalidReactionKind(_)
            | Self::EmptyComment
            | Self::CommentTooLong => ErrorCode::Validation,
            Self::PostNotFound => ErrorCode::PostNotFound,
            Self::DuplicateReaction => ErrorCode::DuplicateReaction,
            Self::ReactionNotFound => ErrorCode::ReactionNotFound,
            Self::Storage(_) => ErrorCode::Internal,
        }
    }
}

/// An interaction whose payload passed shape validation. Nothing here has
/// touched the database yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInteraction {
    pub post_id: String,
    pub interaction: Interaction,
}

impl TryFrom<InteractionRequest> for ValidatedInteraction {
    type Error = InteractionError;

    fn try_from(request: InteractionRequest) -> Result<Self, Self::Error> {
        if !is_valid_public_id(&request.post_id) {
            return Err(InteractionError::InvalidPostId);
        }

        let interaction = match request.kind {
            InteractionKind::Reaction => {
                let kind = match request.reaction_kind {
                    Some(raw) => Some(
                        raw.parse::<ReactionKind>()
                            .map_err(|err| InteractionError::InvalidReactionKind(err.0))?,
                    ),
                    None => None,
                };
                Interaction::Reaction(kind)
            }
            InteractionKind::Comment => {
                let text = request.comment_text.unwrap_or_default();
                let text = text.trim();
                if text.is_empty() {
                    return Err(InteractionError::EmptyComment);
                }
                if text.chars().count() > MAX_COMMENT_CHARS {
                    return Err(InteractionError::CommentTooLong);
                }
                Interaction::Comment(text.to_string())
            }
            InteractionKind::Share => Interaction::Share,
        };

        Ok(Self {
            post_id: request.post_id,
            interaction,
        })
    }
}

#[derive(Debug, Clone)]
pub enum InteractionOutcome {
    ReactionAdded {
        reaction: Reaction,
        counters: PostCounters,
    },
    ReactionReplaced {
        reaction: Reaction,
        previous: ReactionKind,
        counters: PostCounters,
    },
    ReactionRemoved {
        previous: ReactionKind,
        counters: PostCounters,
    },
    Commented {
        comment: Comment,
        counters: PostCounters,
    },
    Shared {
        share: Share,
        counters: PostCounters,
    },
}

impl InteractionOutcome {
    pub fn counters(&self) -> PostCounters {
        match self {
            Self::ReactionAdded { counters, .. }
            | Self::ReactionReplaced { counters, .. }
            | Self::ReactionRemoved { counters, .. }
            | Self::Commented { counters, .. }
            | Self::Shared { counters, .. } => *counters,
        }
    }
}

impl From<InteractionOutcome> for InteractionResponse {
    fn from(outcome: InteractionOutcome) -> Self {
        let counters = outcome.counters();
        match outcome {
            InteractionOutcome::ReactionAdded { reaction, .. } => {
                let mut response = InteractionResponse::success("reaction added", counters);
                response.id = Some(reaction.id);
                response.created_at = Some(reaction.created_at);
                response.reaction_kind = Some(reaction.kind);
                response
            }
            InteractionOutcome::ReactionReplaced { reaction, .. } => {
                let mut response = InteractionResponse::success("reaction updated", counters);
                response.id = Some(reaction.id);
                response.created_at = Some(reaction.created_at);
                response.reaction_kind = Some(reaction.kind);
                response
            }
            InteractionOutcome::ReactionRemoved { .. } => {
                InteractionResponse::success("reaction removed", counters)
            }
            InteractionOutcome::Commented { comment, .. } => {
                let mut response = InteractionResponse::success("comment added", counters);
                response.id = Some(comment.id);
                response.created_at = Some(comment.created_at);
                response.actor_display_fields = Some(comment.author);
                response
            }
            InteractionOutcome::Shared { share, .. } => {
                let mut response = InteractionResponse::success("post shared", counters);
                response.id = Some(share.id);
                response.created_at = Some(share.created_at);
                response
            }
        }
    }
}

/// Applies interactions against the detail tables and the post's cached
/// counters inside a single transaction.
#[derive(Clone)]
pub struct InteractionService {
    db: Db,
    links: MediaLinks,
}

impl InteractionService {
    pub fn new(db: Db, links: MediaLinks) -> Self {
        Self { db, links }
    }

    pub async fn apply(
        &self,
        actor_id: Uuid,
        validated: ValidatedInteraction,
    ) -> Result<InteractionOutcome, InteractionError> {
        let ValidatedInteraction {
            post_id,
            interaction,
        } = validated;

        let mut tx = self.db.begin().await?;

        // Row lock serializes concurrent writers on the same post. Posts the
        // actor cannot see are reported as missing.
        let locked: Option<String> = sqlx::query_scalar(
            "SELECT id FROM posts \
             WHERE id = $1 AND deleted_at IS NULL \
               AND (visibility = 'public' OR author_id = $2) \
             FOR UPDATE",
        )
        .bind(&post_id)
        .bind(actor_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Err(InteractionError::PostNotFound);
        }

        let result = match interaction {
            Interaction::Reaction(Some(kind)) => react(&mut tx, &post_id, actor_id, kind).await,
            Interaction::Reaction(None) => unreact(&mut tx, &post_id, actor_id).await,
            Interaction::Comment(text) => {
                comment(&mut tx, &post_id, actor_id, &text, &self.links).await
            }
            Interaction::Share => share(&mut tx, &post_id, actor_id).await,
        };

        match result {
            Ok(outcome) => {
                tx.commit().await?;
                tracing::debug!(post_id = %post_id, actor_id = %actor_id, counters = ?outcome.counters(), "interaction applied");
                Ok(outcome)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }
}

async fn react(
    tx: &mut PgTx<'_>,
    post_id: &str,
    actor_id: Uuid,
    kind: ReactionKind,
) -> Result<InteractionOutcome, InteractionError> {
    let existing = sqlx::query(
        "SELECT id, kind::text AS kind FROM post_reactions \
         WHERE post_id = $1 AND actor_id = $2 FOR UPDATE",
    )
    .bind(post_id)
    .bind(actor_id)
    .fetch_optional(&mut **tx)
    .await?;

    match existing {
        None => {
            let row = sqlx::query(
                "INSERT INTO post_reactions (id, post_id, actor_id, kind) \
                 VALUES ($1, $2, $3, $4::reaction_kind) \
                 RETURNING id, created_at",
            )
            .bind(new_public_id())
            .bind(post_id)
            .bind(actor_id)
            .bind(kind.as_db())
            .fetch_one(&mut **tx)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    InteractionError::DuplicateReaction
                }
                other => InteractionError::Storage(other),
            })?;

            let counters = CounterStore::adjust_with_tx(tx, post_id, Counter::Likes, 1).await?;
            Ok(InteractionOutcome::ReactionAdded {
                reaction: Reaction {
                    id: row.get("id"),
                    post_id: post_id.to_string(),
                    actor_id,
                    kind,
                    created_at: row.get("created_at"),
                },
                counters,
            })
        }
        Some(row) => {
            let previous = stored_kind(row.get("kind"))?;
            if previous == kind {
                return Err(InteractionError::DuplicateReaction);
            }

            let reaction_id: String = row.get("id");
            let created_at: OffsetDateTime = sqlx::query_scalar(
                "UPDATE post_reactions SET kind = $2::reaction_kind \
                 WHERE id = $1 RETURNING created_at",
            )
            .bind(&reaction_id)
            .bind(kind.as_db())
            .fetch_one(&mut **tx)
            .await?;

            // One actor still contributes exactly one unit.
            let counters = CounterStore::read_with_tx(tx, post_id).await?;
            Ok(InteractionOutcome::ReactionReplaced {
                reaction: Reaction {
                    id: reaction_id,
                    post_id: post_id.to_string(),
                    actor_id,
                    kind,
                    created_at,
                },
                previous,
                counters,
            })
        }
    }
}

async fn unreact(
    tx: &mut PgTx<'_>,
    post_id: &str,
    actor_id: Uuid,
) -> Result<InteractionOutcome, InteractionError> {
    let deleted: Option<String> = sqlx::query_scalar(
        "DELETE FROM post_reactions WHERE post_id = $1 AND actor_id = $2 \
         RETURNING kind::text",
    )
    .bind(post_id)
    .bind(actor_id)
    .fetch_optional(&mut **tx)
    .await?;

    let previous = match deleted {
        Some(kind) => stored_kind(kind)?,
        None => return Err(InteractionError::ReactionNotFound),
    };

    let counters = CounterStore::adjust_with_tx(tx, post_id, Counter::Likes, -1).await?;
    Ok(InteractionOutcome::ReactionRemoved { previous, counters })
}

async fn comment(
    tx: &mut PgTx<'_>,
    post_id: &str,
    actor_id: Uuid,
    text: &str,
    links: &MediaLinks,
) -> Result<InteractionOutcome, InteractionError> {
    let row = sqlx::query(
        "WITH inserted AS ( \
            INSERT INTO post_comments (id, post_id, actor_id, body) \
            VALUES ($1, $2, $3, $4) \
            RETURNING id, post_id, actor_id, body, created_at \
         ) \
         SELECT c.id, c.post_id, c.body, c.created_at, \
                u.id AS actor_id, u.handle AS actor_handle, \
                u.display_name AS actor_display_name, u.avatar_key AS actor_avatar_key \
         FROM inserted c \
         JOIN users u ON u.id = c.actor_id",
    )
    .bind(new_public_id())
    .bind(post_id)
    .bind(actor_id)
    .bind(text)
    .fetch_one(&mut **tx)
    .await?;

    let comment = comment_from_row(&row, links);
    let counters = CounterStore::adjust_with_tx(tx, post_id, Counter::Comments, 1).await?;
    Ok(InteractionOutcome::Commented { comment, counters })
}

async fn share(
    tx: &mut PgTx<'_>,
    post_id: &str,
    actor_id: Uuid,
) -> Result<InteractionOutcome, InteractionError> {
    let row = sqlx::query(
        "INSERT INTO post_shares (id, post_id, actor_id) VALUES ($1, $2, $3) \
         RETURNING id, created_at",
    )
    .bind(new_public_id())
    .bind(post_id)
    .bind(actor_id)
    .fetch_one(&mut **tx)
    .await?;

    let counters = CounterStore::adjust_with_tx(tx, post_id, Counter::Shares, 1).await?;
    Ok(InteractionOutcome::Shared {
        share: Share {
            id: row.get("id"),
            post_id: post_id.to_string(),
            actor_id,
            created_at: row.get("created_at"),
        },
        counters,
    })
}

fn stored_kind(raw: String) -> Result<ReactionKind, InteractionError> {
    ReactionKind::from_db(&raw).ok_or_else(|| {
        InteractionError::Storage(sqlx::Error::Decode(
            format!("unknown reaction kind: {}", raw).into(),
        ))
    })
}
