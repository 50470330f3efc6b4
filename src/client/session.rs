use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::client::api::{ApiError, InteractionApi};
use crate::client::feed::{FeedFilter, FeedView, Pager};
use crate::client::reconcile::{persisted_comment_count, BeginError, PostView};
use crate::client::store::{FeedStore, Notice, StoreResolution, Ticket};
use crate::domain::interaction::{InteractionRequest, ReactionKind};
use crate::domain::post::Post;
use crate::domain::user::ActorDisplay;

pub const COMMENT_PAGE_SIZE: i64 = 10;

/// How an interaction ended from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Confirmed(PostView),
    RolledBack(ApiError),
    /// The feed was torn down before the server answered.
    Discarded,
}

#[derive(Debug)]
struct SessionState {
    store: FeedStore,
    view: FeedView,
    pager: Pager,
    comment_pagers: HashMap<String, Pager>,
}

/// Drives one mounted owner feed against an [`InteractionApi`].
///
/// The state lock is only taken between awaits, never across one, so
/// interactions on different slots or posts run concurrently.
pub struct InteractionSession<A> {
    api: A,
    owner_slug: String,
    viewer: ActorDisplay,
    take: i64,
    state: Mutex<SessionState>,
}

impl<A: InteractionApi> InteractionSession<A> {
    /// Mounts the feed with the server-rendered first page.
    pub fn new(
        api: A,
        owner_slug: impl Into<String>,
        viewer: ActorDisplay,
        initial: Vec<Post>,
        take: i64,
    ) -> Self {
        let mut store = FeedStore::new();
        for post in &initial {
            store.track(post);
        }
        let pager = Pager::new(initial.len(), take);

        Self {
            api,
            owner_slug: owner_slug.into(),
            viewer,
            take,
            state: Mutex::new(SessionState {
                store,
                view: FeedView::new(initial),
                pager,
                comment_pagers: HashMap::new(),
            }),
        }
    }

    pub async fn toggle_reaction(
        &self,
        post_id: &str,
        kind: ReactionKind,
    ) -> Result<Settled, BeginError> {
        let (ticket, request) = self.state.lock().await.store.begin_reaction(post_id, kind)?;
        Ok(self.drive(ticket, request).await)
    }

    pub async fn submit_comment(&self, post_id: &str, text: &str) -> Result<Settled, BeginError> {
        let (ticket, request) = self
            .state
            .lock()
            .await
            .store
            .begin_comment(post_id, text, &self.viewer)?;
        Ok(self.drive(ticket, request).await)
    }

    pub async fn share(&self, post_id: &str) -> Result<Settled, BeginError> {
        let (ticket, request) = self.state.lock().await.store.begin_share(post_id)?;
        Ok(self.drive(ticket, request).await)
    }

    /// Fetches the next page of posts. `Ok(None)` means no request was made,
    /// either because the feed is exhausted or a page is already loading, or
    /// that the feed was torn down before the page arrived.
    pub async fn load_next_page(&self) -> Result<Option<usize>, ApiError> {
        let (generation, (skip, take)) = {
            let mut state = self.state.lock().await;
            match state.pager.next_request() {
                Some(request) => (state.store.generation(), request),
                None => return Ok(None),
            }
        };

        let result = self.api.fetch_posts(&self.owner_slug, skip, take).await;

        let mut state = self.state.lock().await;
        if state.store.generation() != generation {
            return Ok(None);
        }
        match result {
            Ok(posts) => {
                let received = posts.len();
                state.pager.complete(Ok(received));
                for post in &posts {
                    state.store.track(post);
                }
                state.view.merge(posts);
                Ok(Some(received))
            }
            Err(err) => {
                tracing::debug!(owner_slug = %self.owner_slug, skip = skip, error = %err, "page load failed");
                state.pager.complete(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Fetches older comments for one post and merges them into its list.
    pub async fn load_more_comments(&self, post_id: &str) -> Result<Option<usize>, ApiError> {
        let (generation, (skip, take)) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(view) = state.store.view(post_id) else {
                return Ok(None);
            };
            let seen = persisted_comment_count(&view.comments);
            let request = state
                .comment_pagers
                .entry(post_id.to_string())
                .or_insert_with(|| Pager::new(seen, COMMENT_PAGE_SIZE))
                .next_request();
            match request {
                Some(request) => (state.store.generation(), request),
                None => return Ok(None),
            }
        };

        let result = self.api.fetch_comments(post_id, skip, take).await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.store.generation() != generation {
            return Ok(None);
        }
        let Some(pager) = state.comment_pagers.get_mut(post_id) else {
            return Ok(None);
        };
        match result {
            Ok(comments) => {
                let received = comments.len();
                pager.complete(Ok(received));
                state.store.merge_comments(post_id, comments);
                Ok(Some(received))
            }
            Err(err) => {
                pager.complete(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// The merged feed with local state applied, filtered and ordered.
    pub async fn posts(&self, filter: &FeedFilter) -> Vec<Post> {
        let state = self.state.lock().await;
        filter.apply(state.view.posts(&state.store))
    }

    pub async fn view(&self, post_id: &str) -> Option<PostView> {
        self.state.lock().await.store.view(post_id).cloned()
    }

    pub async fn pager(&self) -> Pager {
        self.state.lock().await.pager.clone()
    }

    pub async fn notices(&self) -> Vec<Notice> {
        self.state.lock().await.store.notices().to_vec()
    }

    pub async fn dismiss(&self, notice_id: u64) -> bool {
        self.state.lock().await.store.dismiss(notice_id)
    }

    /// Unmounts the feed. Anything still in flight is discarded on arrival.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        state.store.clear();
        state.view.clear();
        state.comment_pagers.clear();
        state.pager = Pager::new(0, self.take);
    }

    async fn drive(&self, ticket: Ticket, request: InteractionRequest) -> Settled {
        let result = self.api.submit(request).await;
        let resolution = self.state.lock().await.store.resolve(&ticket, result);

        let resolution = match resolution {
            StoreResolution::Compensate(ticket, remove) => {
                tracing::debug!(post_id = ticket.post_id(), "duplicate reaction, sending compensating remove");
                let result = self.api.submit(remove).await;
                self.state.lock().await.store.resolve(&ticket, result)
            }
            other => other,
        };

        match resolution {
            StoreResolution::Confirmed => match self.view(ticket.post_id()).await {
                Some(view) => Settled::Confirmed(view),
                None => Settled::Discarded,
            },
            StoreResolution::RolledBack(err) => Settled::RolledBack(err),
            StoreResolution::Compensate(..) | StoreResolution::Discarded => Settled::Discarded,
        }
    }
}
