use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::post::PostCounters;
use crate::infra::db::{Db, PgTx};

/// One of the three denormalized aggregates on `posts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Likes,
    Comments,
    Shares,
}

impl Counter {
    fn column(&self) -> &'static str {
        match self {
            Counter::Likes => "like_count",
            Counter::Comments => "comment_count",
            Counter::Shares => "share_count",
        }
    }

    fn detail_table(&self) -> &'static str {
        match self {
            Counter::Likes => "post_reactions",
            Counter::Comments => "post_comments",
            Counter::Shares => "post_shares",
        }
    }
}

/// Reads and writes the cached counters. Writers must go through
/// [`CounterStore::adjust_with_tx`] inside the transaction that changes the
/// matching detail rows.
#[derive(Clone)]
pub struct CounterStore {
    db: Db,
}

impl CounterStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Applies `delta` after the detail rows were written in `tx`. A value
    /// that would go negative has drifted and is recounted from the detail
    /// table instead.
    pub async fn adjust_with_tx(
        tx: &mut PgTx<'_>,
        post_id: &str,
        counter: Counter,
        delta: i64,
    ) -> Result<PostCounters, sqlx::Error> {
        let column = counter.column();
        let detail = counter.detail_table();
        let sql = format!(
            "UPDATE posts SET {column} = CASE \
                WHEN {column} + $2 < 0 \
                    THEN (SELECT COUNT(*) FROM {detail} WHERE post_id = $1) \
                ELSE {column} + $2 \
             END \
             WHERE id = $1 \
             RETURNING like_count, comment_count, share_count"
        );
        let row = sqlx::query(&sql)
            .bind(post_id)
            .bind(delta)
            .fetch_one(&mut **tx)
            .await?;
        Ok(counters_from_row(&row))
    }

    pub async fn read_with_tx(tx: &mut PgTx<'_>, post_id: &str) -> Result<PostCounters, sqlx::Error> {
        let row = sqlx::query(
            "SELECT like_count, comment_count, share_count FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(counters_from_row(&row))
    }

    pub async fn get(&self, post_id: &str) -> Result<Option<PostCounters>> {
        let row = sqlx::query(
            "SELECT like_count, comment_count, share_count FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.as_ref().map(counters_from_row))
    }

    /// Counts straight from the detail tables, ignoring the cached columns.
    pub async fn recount(&self, post_id: &str) -> Result<Option<PostCounters>> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM post_reactions WHERE post_id = p.id) AS like_count, \
                (SELECT COUNT(*) FROM post_comments WHERE post_id = p.id) AS comment_count, \
                (SELECT COUNT(*) FROM post_shares WHERE post_id = p.id) AS share_count \
             FROM posts p WHERE p.id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.as_ref().map(counters_from_row))
    }

    /// Rewrites cached counters that drifted from their detail rows and
    /// returns how many posts were touched.
    pub async fn repair_all(&self) -> Result<u64> {
        let result = sqlx::query(
            "WITH actual AS ( \
                SELECT p.id, \
                       (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id) AS likes, \
                       (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comments, \
                       (SELECT COUNT(*) FROM post_shares s WHERE s.post_id = p.id) AS shares \
                FROM posts p \
             ) \
             UPDATE posts p \
             SET like_count = a.likes, comment_count = a.comments, share_count = a.shares \
             FROM actual a \
             WHERE p.id = a.id \
               AND (p.like_count <> a.likes \
                    OR p.comment_count <> a.comments \
                    OR p.share_count <> a.shares)",
        )
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}

pub(crate) fn counters_from_row(row: &PgRow) -> PostCounters {
    PostCounters {
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        share_count: row.get("share_count"),
    }
}
