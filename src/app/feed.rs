use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::counters::counters_from_row;
use crate::domain::interaction::{Comment, ReactionKind};
use crate::domain::post::{MediaItem, Post, PostVisibility};
use crate::domain::user::ActorDisplay;
use crate::infra::db::Db;
use crate::infra::storage::MediaLinks;

#[derive(Debug, Clone, Copy)]
enum Owner {
    Business(Uuid),
    User(Uuid),
}

/// Reverse-chronological owner feeds with a bounded comment preview per post,
/// plus on-demand comment pages for a single post.
#[derive(Clone)]
pub struct FeedService {
    db: Db,
    links: MediaLinks,
    preview_limit: i64,
}

impl FeedService {
    pub fn new(db: Db, links: MediaLinks, preview_limit: i64) -> Self {
        Self {
            db,
            links,
            preview_limit,
        }
    }

    /// Public posts of the owner named by `owner_slug`. A business slug takes
    /// precedence; otherwise the slug is read as a user handle and matches
    /// that user's posts that belong to no business.
    pub async fn list_owner_posts(
        &self,
        owner_slug: &str,
        viewer_id: Option<Uuid>,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Post>> {
        let Some(owner) = self.resolve_owner(owner_slug).await? else {
            return Ok(Vec::new());
        };
        let (business_id, author_id) = match owner {
            Owner::Business(id) => (Some(id), None),
            Owner::User(id) => (None, Some(id)),
        };

        let rows = sqlx::query(
            "SELECT p.id, p.business_id, p.description, p.media, \
                    p.visibility::text AS visibility, p.created_at, \
                    p.like_count, p.comment_count, p.share_count, \
                    u.id AS author_id, u.handle AS author_handle, \
                    u.display_name AS author_display_name, u.avatar_key AS author_avatar_key, \
                    vr.kind::text AS viewer_reaction \
             FROM posts p \
             JOIN users u ON u.id = p.author_id AND u.deleted_at IS NULL \
             LEFT JOIN post_reactions vr ON vr.post_id = p.id AND vr.actor_id = $3 \
             WHERE p.deleted_at IS NULL \
               AND p.visibility = 'public' \
               AND (p.business_id = $1 OR (p.business_id IS NULL AND p.author_id = $2)) \
             ORDER BY p.created_at DESC, p.id DESC \
             OFFSET $4 LIMIT $5",
        )
        .bind(business_id)
        .bind(author_id)
        .bind(viewer_id)
        .bind(skip)
        .bind(take)
        .fetch_all(self.db.pool())
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(self.post_from_row(row)?);
        }

        if posts.is_empty() || self.preview_limit == 0 {
            return Ok(posts);
        }

        let ids: Vec<String> = posts.iter().map(|post| post.id.clone()).collect();
        let mut previews = self.comment_previews(&ids).await?;
        for post in &mut posts {
            if let Some(comments) = previews.remove(&post.id) {
                post.comments = comments;
            }
        }

        Ok(posts)
    }

    /// Returns `None` when the post does not exist, was deleted, or is not
    /// visible to `viewer_id`.
    pub async fn list_comments(
        &self,
        post_id: &str,
        viewer_id: Option<Uuid>,
        skip: i64,
        take: i64,
    ) -> Result<Option<Vec<Comment>>> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM posts \
                WHERE id = $1 AND deleted_at IS NULL \
                  AND (visibility = 'public' OR author_id = $2) \
             )",
        )
        .bind(post_id)
        .bind(viewer_id)
        .fetch_one(self.db.pool())
        .await?;
        if !exists {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.body, c.created_at, \
                    u.id AS actor_id, u.handle AS actor_handle, \
                    u.display_name AS actor_display_name, u.avatar_key AS actor_avatar_key \
             FROM post_comments c \
             JOIN users u ON u.id = c.actor_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC \
             OFFSET $2 LIMIT $3",
        )
        .bind(post_id)
        .bind(skip)
        .bind(take)
        .fetch_all(self.db.pool())
        .await?;

        Ok(Some(
            rows.iter()
                .map(|row| comment_from_row(row, &self.links))
                .collect(),
        ))
    }

    async fn resolve_owner(&self, slug: &str) -> Result<Option<Owner>> {
        let business: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM businesses WHERE slug = $1")
                .bind(slug)
                .fetch_optional(self.db.pool())
                .await?;
        if let Some(id) = business {
            return Ok(Some(Owner::Business(id)));
        }

        let user: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users WHERE handle = $1 AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user.map(Owner::User))
    }

    async fn comment_previews(&self, post_ids: &[String]) -> Result<HashMap<String, Vec<Comment>>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.body, c.created_at, \
                    u.id AS actor_id, u.handle AS actor_handle, \
                    u.display_name AS actor_display_name, u.avatar_key AS actor_avatar_key \
             FROM ( \
                SELECT pc.*, ROW_NUMBER() OVER ( \
                    PARTITION BY pc.post_id ORDER BY pc.created_at DESC, pc.id DESC \
                ) AS rn \
                FROM post_comments pc \
                WHERE pc.post_id = ANY($1) \
             ) c \
             JOIN users u ON u.id = c.actor_id \
             WHERE c.rn <= $2 \
             ORDER BY c.post_id, c.created_at DESC, c.id DESC",
        )
        .bind(post_ids)
        .bind(self.preview_limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut previews: HashMap<String, Vec<Comment>> = HashMap::new();
        for row in &rows {
            let comment = comment_from_row(row, &self.links);
            previews
                .entry(comment.post_id.clone())
                .or_default()
                .push(comment);
        }
        Ok(previews)
    }

    fn post_from_row(&self, row: &PgRow) -> Result<Post> {
        let visibility: String = row.get("visibility");
        let visibility = PostVisibility::from_db(&visibility)
            .ok_or_else(|| anyhow!("unknown post visibility: {}", visibility))?;

        let viewer_reaction: Option<String> = row.get("viewer_reaction");
        let viewer_reaction = match viewer_reaction {
            Some(kind) => Some(
                ReactionKind::from_db(&kind)
                    .ok_or_else(|| anyhow!("unknown reaction kind: {}", kind))?,
            ),
            None => None,
        };

        let media: Json<Vec<MediaItem>> = row.get("media");

        Ok(Post {
            id: row.get("id"),
            author: ActorDisplay::resolve(
                row.get("author_id"),
                row.get("author_display_name"),
                row.get("author_handle"),
                row.get("author_avatar_key"),
                &self.links,
            ),
            business_id: row.get("business_id"),
            description: row.get("description"),
            media: media.0,
            visibility,
            created_at: row.get("created_at"),
            counters: counters_from_row(row),
            comments: Vec::new(),
            viewer_reaction,
        })
    }
}

/// Maps a comment row joined with its author (`actor_*` columns).
pub(crate) fn comment_from_row(row: &PgRow, links: &MediaLinks) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author: ActorDisplay::resolve(
            row.get("actor_id"),
            row.get("actor_display_name"),
            row.get("actor_handle"),
            row.get("actor_avatar_key"),
            links,
        ),
        text: row.get("body"),
        created_at: row.get("created_at"),
    }
}
