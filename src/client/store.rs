use std::collections::HashMap;

use crate::client::api::ApiError;
use crate::client::reconcile::{BeginError, PostInteractionState, PostView, Resolution};
use crate::domain::interaction::{
    Comment, ErrorClass, InteractionKind, InteractionRequest, InteractionResponse, ReactionKind,
};
use crate::domain::post::Post;
use crate::domain::user::ActorDisplay;

/// Identifies one in-flight interaction. Stale once the store is cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    post_id: String,
    kind: InteractionKind,
}

impl Ticket {
    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }
}

/// A dismissible, non-fatal failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub post_id: String,
    pub kind: InteractionKind,
    pub class: ErrorClass,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResolution {
    Confirmed,
    RolledBack(ApiError),
    Compensate(Ticket, InteractionRequest),
    /// The store was cleared while the request was in flight.
    Discarded,
}

/// Per-feed interaction state. Created empty when a feed is mounted and
/// cleared when it is torn down.
#[derive(Debug, Default)]
pub struct FeedStore {
    generation: u64,
    posts: HashMap<String, PostInteractionState>,
    notices: Vec<Notice>,
    next_notice_id: u64,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts tracking `post`, or refreshes idle slots from a newer copy.
    pub fn track(&mut self, post: &Post) {
        match self.posts.get_mut(&post.id) {
            Some(state) => state.refresh(post),
            None => {
                self.posts
                    .insert(post.id.clone(), PostInteractionState::new(post));
            }
        }
    }

    pub fn state(&self, post_id: &str) -> Option<&PostInteractionState> {
        self.posts.get(post_id)
    }

    pub fn view(&self, post_id: &str) -> Option<&PostView> {
        self.posts.get(post_id).map(PostInteractionState::view)
    }

    pub fn begin_reaction(
        &mut self,
        post_id: &str,
        kind: ReactionKind,
    ) -> Result<(Ticket, InteractionRequest), BeginError> {
        let request = self.state_mut(post_id)?.begin_reaction(kind)?;
        Ok((self.ticket(post_id, InteractionKind::Reaction), request))
    }

    pub fn begin_comment(
        &mut self,
        post_id: &str,
        text: &str,
        viewer: &ActorDisplay,
    ) -> Result<(Ticket, InteractionRequest), BeginError> {
        let request = self.state_mut(post_id)?.begin_comment(text, viewer)?;
        Ok((self.ticket(post_id, InteractionKind::Comment), request))
    }

    pub fn begin_share(&mut self, post_id: &str) -> Result<(Ticket, InteractionRequest), BeginError> {
        let request = self.state_mut(post_id)?.begin_share()?;
        Ok((self.ticket(post_id, InteractionKind::Share), request))
    }

    pub fn resolve(
        &mut self,
        ticket: &Ticket,
        result: Result<InteractionResponse, ApiError>,
    ) -> StoreResolution {
        if ticket.generation != self.generation {
            tracing::debug!(post_id = %ticket.post_id, "discarding stale interaction result");
            return StoreResolution::Discarded;
        }
        let Some(state) = self.posts.get_mut(&ticket.post_id) else {
            return StoreResolution::Discarded;
        };

        match state.resolve(ticket.kind, result) {
            Resolution::Confirmed => StoreResolution::Confirmed,
            Resolution::Compensate(request) => StoreResolution::Compensate(ticket.clone(), request),
            Resolution::RolledBack(err) => {
                self.push_notice(ticket, &err);
                StoreResolution::RolledBack(err)
            }
        }
    }

    /// Overlays the locally reconciled fields onto a server copy of a post.
    pub fn overlay(&self, post: &mut Post) {
        if let Some(view) = self.view(&post.id) {
            post.counters = view.counters;
            post.viewer_reaction = view.viewer_reaction;
            post.comments = view.comments.clone();
        }
    }

    pub fn merge_comments(&mut self, post_id: &str, comments: Vec<Comment>) {
        if let Some(state) = self.posts.get_mut(post_id) {
            state.merge_comments(comments);
        }
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss(&mut self, notice_id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != notice_id);
        self.notices.len() != before
    }

    /// Drops all state. Results for tickets issued before this call are
    /// discarded when they arrive.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.posts.clear();
        self.notices.clear();
    }

    fn state_mut(&mut self, post_id: &str) -> Result<&mut PostInteractionState, BeginError> {
        self.posts.get_mut(post_id).ok_or(BeginError::UnknownPost)
    }

    fn ticket(&self, post_id: &str, kind: InteractionKind) -> Ticket {
        Ticket {
            generation: self.generation,
            post_id: post_id.to_string(),
            kind,
        }
    }

    fn push_notice(&mut self, ticket: &Ticket, err: &ApiError) {
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id: self.next_notice_id,
            post_id: ticket.post_id.clone(),
            kind: ticket.kind,
            class: err.class(),
            message: err.to_string(),
        });
    }
}
