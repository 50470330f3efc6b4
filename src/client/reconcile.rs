//! Optimistic interaction state for a single post.
//!
//! Each post has three slots (reaction, comment, share). A slot moves
//! `Idle -> Optimistic -> Confirmed | RolledBack` and only ever writes the
//! fields it owns:
//!
//! | slot     | fields                                |
//! |----------|---------------------------------------|
//! | reaction | `like_count`, `viewer_reaction`       |
//! | comment  | `comment_count`, `comments`           |
//! | share    | `share_count`                         |
//!
//! Rollback restores the owned fields from the snapshot taken when the slot
//! went optimistic, so a failure on one slot cannot clobber another.

use std::collections::HashMap;
use thiserror::Error;
use time::OffsetDateTime;

use crate::client::api::ApiError;
use crate::domain::ids::{is_temp_id, new_temp_id};
use crate::domain::interaction::{
    Comment, InteractionKind, InteractionRequest, InteractionResponse, ReactionKind,
};
use crate::domain::post::{Post, PostCounters};
use crate::domain::user::ActorDisplay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Optimistic,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeginError {
    #[error("an interaction of this kind is already in flight for this post")]
    InFlight,
    #[error("comment text is required")]
    EmptyComment,
    #[error("post is not loaded")]
    UnknownPost,
}

/// What the caller must do after feeding a server result back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Confirmed,
    RolledBack(ApiError),
    /// The server reported a duplicate reaction. The view now shows no
    /// reaction and the caller must send this remove and resolve again.
    Compensate(InteractionRequest),
}

/// The locally rendered interaction fields of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostView {
    pub post_id: String,
    pub counters: PostCounters,
    pub viewer_reaction: Option<ReactionKind>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Snapshot {
    Reaction {
        like_count: i64,
        viewer_reaction: Option<ReactionKind>,
    },
    Comment {
        comment_count: i64,
        temp_id: String,
    },
    Share {
        share_count: i64,
    },
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    phase: Phase,
    snapshot: Option<Snapshot>,
    compensating: bool,
}

impl SlotState {
    fn in_flight(&self) -> bool {
        self.phase == Phase::Optimistic
    }

    fn start(&mut self, snapshot: Snapshot) {
        self.phase = Phase::Optimistic;
        self.snapshot = Some(snapshot);
        self.compensating = false;
    }

    fn settle(&mut self, phase: Phase) -> Option<Snapshot> {
        self.phase = phase;
        self.compensating = false;
        self.snapshot.take()
    }
}

#[derive(Debug, Clone)]
pub struct PostInteractionState {
    view: PostView,
    reaction: SlotState,
    comment: SlotState,
    share: SlotState,
}

impl PostInteractionState {
    pub fn new(post: &Post) -> Self {
        Self {
            view: PostView {
                post_id: post.id.clone(),
                counters: post.counters,
                viewer_reaction: post.viewer_reaction,
                comments: dedupe_comments(post.comments.clone()),
            },
            reaction: SlotState::default(),
            comment: SlotState::default(),
            share: SlotState::default(),
        }
    }

    pub fn view(&self) -> &PostView {
        &self.view
    }

    pub fn phase(&self, kind: InteractionKind) -> Phase {
        self.slot(kind).phase
    }

    pub fn is_in_flight(&self, kind: InteractionKind) -> bool {
        self.slot(kind).in_flight()
    }

    /// Toggle semantics: asking for the kind the viewer already has removes it.
    pub fn begin_reaction(&mut self, kind: ReactionKind) -> Result<InteractionRequest, BeginError> {
        if self.reaction.in_flight() {
            return Err(BeginError::InFlight);
        }

        let current = self.view.viewer_reaction;
        self.reaction.start(Snapshot::Reaction {
            like_count: self.view.counters.like_count,
            viewer_reaction: current,
        });

        let requested = if current == Some(kind) { None } else { Some(kind) };
        match (current, requested) {
            (None, Some(_)) => self.view.counters.like_count += 1,
            (Some(_), None) => {
                self.view.counters.like_count = (self.view.counters.like_count - 1).max(0)
            }
            _ => {}
        }
        self.view.viewer_reaction = requested;

        Ok(InteractionRequest::reaction(&self.view.post_id, requested))
    }

    /// Inserts a temporary comment authored by `viewer` at the top of the list.
    pub fn begin_comment(
        &mut self,
        text: &str,
        viewer: &ActorDisplay,
    ) -> Result<InteractionRequest, BeginError> {
        if self.comment.in_flight() {
            return Err(BeginError::InFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(BeginError::EmptyComment);
        }

        let temp_id = new_temp_id();
        self.comment.start(Snapshot::Comment {
            comment_count: self.view.counters.comment_count,
            temp_id: temp_id.clone(),
        });

        self.view.counters.comment_count += 1;
        self.view.comments.insert(
            0,
            Comment {
                id: temp_id,
                post_id: self.view.post_id.clone(),
                author: viewer.clone(),
                text: text.to_string(),
                created_at: OffsetDateTime::now_utc(),
            },
        );

        Ok(InteractionRequest::comment(&self.view.post_id, text))
    }

    pub fn begin_share(&mut self) -> Result<InteractionRequest, BeginError> {
        if self.share.in_flight() {
            return Err(BeginError::InFlight);
        }
        self.share.start(Snapshot::Share {
            share_count: self.view.counters.share_count,
        });
        self.view.counters.share_count += 1;
        Ok(InteractionRequest::share(&self.view.post_id))
    }

    /// Feeds the server's answer for `kind` back into the slot. Results for a
    /// slot that is not in flight are ignored and reported as confirmed.
    pub fn resolve(
        &mut self,
        kind: InteractionKind,
        result: Result<InteractionResponse, ApiError>,
    ) -> Resolution {
        if !self.slot(kind).in_flight() {
            return Resolution::Confirmed;
        }

        match result {
            Ok(response) => {
                self.confirm(kind, response);
                Resolution::Confirmed
            }
            Err(err)
                if kind == InteractionKind::Reaction
                    && err.is_duplicate_reaction()
                    && !self.reaction.compensating =>
            {
                self.reaction.compensating = true;
                if let Some(Snapshot::Reaction {
                    like_count,
                    viewer_reaction,
                }) = &self.reaction.snapshot
                {
                    let had_reaction = viewer_reaction.is_some() as i64;
                    self.view.counters.like_count = (like_count - had_reaction).max(0);
                }
                self.view.viewer_reaction = None;
                Resolution::Compensate(InteractionRequest::reaction(&self.view.post_id, None))
            }
            Err(err) => {
                self.roll_back(kind);
                Resolution::RolledBack(err)
            }
        }
    }

    /// Adopts a fresher server copy of the post for every slot that is not
    /// in flight. Comments are merged, never dropped.
    pub fn refresh(&mut self, post: &Post) {
        self.adopt_counters(post.counters);
        if !self.reaction.in_flight() {
            self.view.viewer_reaction = post.viewer_reaction;
        }
        self.merge_comments(post.comments.iter().cloned());
    }

    /// Adds a page of server comments. Temporary entries are kept.
    pub fn merge_comments(&mut self, comments: impl IntoIterator<Item = Comment>) {
        let mut merged = std::mem::take(&mut self.view.comments);
        merged.extend(comments);
        self.view.comments = dedupe_comments(merged);
    }

    fn confirm(&mut self, kind: InteractionKind, response: InteractionResponse) {
        let snapshot = self.slot_mut(kind).settle(Phase::Confirmed);

        match kind {
            InteractionKind::Reaction => {
                self.view.viewer_reaction = response.reaction_kind;
            }
            InteractionKind::Comment => {
                if let Some(Snapshot::Comment { temp_id, .. }) = snapshot {
                    self.replace_temp_comment(&temp_id, &response);
                }
            }
            InteractionKind::Share => {}
        }

        if let Some(counters) = response.counters {
            self.adopt_counters(counters);
        }
    }

    fn roll_back(&mut self, kind: InteractionKind) {
        let snapshot = self.slot_mut(kind).settle(Phase::RolledBack);
        match snapshot {
            Some(Snapshot::Reaction {
                like_count,
                viewer_reaction,
            }) => {
                self.view.counters.like_count = like_count;
                self.view.viewer_reaction = viewer_reaction;
            }
            Some(Snapshot::Comment {
                comment_count,
                temp_id,
            }) => {
                self.view.counters.comment_count = comment_count;
                self.view.comments.retain(|comment| comment.id != temp_id);
            }
            Some(Snapshot::Share { share_count }) => {
                self.view.counters.share_count = share_count;
            }
            None => {}
        }
    }

    fn replace_temp_comment(&mut self, temp_id: &str, response: &InteractionResponse) {
        let Some(position) = self.view.comments.iter().position(|c| c.id == temp_id) else {
            return;
        };
        let pending = self.view.comments.remove(position);

        let Some(id) = response.id.clone() else {
            return;
        };
        let confirmed = Comment {
            id,
            post_id: pending.post_id,
            author: response
                .actor_display_fields
                .clone()
                .unwrap_or(pending.author),
            text: pending.text,
            created_at: response.created_at.unwrap_or(pending.created_at),
        };
        self.merge_comments([confirmed]);
    }

    fn adopt_counters(&mut self, counters: PostCounters) {
        if !self.reaction.in_flight() {
            self.view.counters.like_count = counters.like_count;
        }
        if !self.comment.in_flight() {
            self.view.counters.comment_count = counters.comment_count;
        }
        if !self.share.in_flight() {
            self.view.counters.share_count = counters.share_count;
        }
    }

    fn slot(&self, kind: InteractionKind) -> &SlotState {
        match kind {
            InteractionKind::Reaction => &self.reaction,
            InteractionKind::Comment => &self.comment,
            InteractionKind::Share => &self.share,
        }
    }

    fn slot_mut(&mut self, kind: InteractionKind) -> &mut SlotState {
        match kind {
            InteractionKind::Reaction => &mut self.reaction,
            InteractionKind::Comment => &mut self.comment,
            InteractionKind::Share => &mut self.share,
        }
    }
}

/// Deduplicates by id (later entries win) and sorts newest first. Temporary
/// entries sort by their local timestamp like any other comment.
pub fn dedupe_comments(comments: Vec<Comment>) -> Vec<Comment> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(comments.len());
    let mut unique: Vec<Comment> = Vec::with_capacity(comments.len());
    for comment in comments {
        match index.get(&comment.id) {
            Some(&position) => unique[position] = comment,
            None => {
                index.insert(comment.id.clone(), unique.len());
                unique.push(comment);
            }
        }
    }
    unique.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    unique
}

/// Number of comments in `comments` that the server knows about.
pub fn persisted_comment_count(comments: &[Comment]) -> usize {
    comments.iter().filter(|comment| !is_temp_id(&comment.id)).count()
}
