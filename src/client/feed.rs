use std::cmp::Ordering;
use std::collections::HashMap;

use crate::client::api::ApiError;
use crate::client::store::FeedStore;
use crate::domain::post::{MediaKind, Post};

/// skip/take cursor for "load more". At most one request is in flight, and
/// a short page ends pagination for good.
#[derive(Debug, Clone)]
pub struct Pager {
    skip: i64,
    take: i64,
    exhausted: bool,
    in_flight: bool,
    last_error: Option<ApiError>,
}

impl Pager {
    /// `initial` is the number of items already rendered.
    pub fn new(initial: usize, take: i64) -> Self {
        Self {
            skip: initial as i64,
            take,
            exhausted: false,
            in_flight: false,
            last_error: None,
        }
    }

    /// The `(skip, take)` to request next, or `None` when exhausted or a
    /// request is already outstanding.
    pub fn next_request(&mut self) -> Option<(i64, i64)> {
        if self.exhausted || self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some((self.skip, self.take))
    }

    /// Records the result of the outstanding request. Failures keep the
    /// cursor where it was so the next trigger retries the same page.
    pub fn complete(&mut self, result: Result<usize, ApiError>) {
        self.in_flight = false;
        match result {
            Ok(received) => {
                self.last_error = None;
                self.skip += self.take;
                if (received as i64) < self.take {
                    self.exhausted = true;
                }
            }
            Err(err) => self.last_error = Some(err),
        }
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn take(&self) -> i64 {
        self.take
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }
}

/// Every post the feed has seen, keyed by id. A later copy of a post
/// replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    order: Vec<String>,
    posts: HashMap<String, Post>,
}

impl FeedView {
    pub fn new(initial: Vec<Post>) -> Self {
        let mut view = Self::default();
        view.merge(initial);
        view
    }

    pub fn merge(&mut self, posts: impl IntoIterator<Item = Post>) {
        for post in posts {
            if !self.posts.contains_key(&post.id) {
                self.order.push(post.id.clone());
            }
            self.posts.insert(post.id.clone(), post);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.posts.get(post_id)
    }

    /// Posts in first-seen order with the store's local state applied.
    pub fn posts(&self, store: &FeedStore) -> Vec<Post> {
        self.order
            .iter()
            .filter_map(|id| self.posts.get(id))
            .cloned()
            .map(|mut post| {
                store.overlay(&mut post);
                post
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.posts.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedFilter {
    #[default]
    Recent,
    /// Likes plus comments, ties broken by recency.
    Popular,
    Media(MediaKind),
    /// The pinned post first, then everything else by recency.
    Pinned(String),
}

impl FeedFilter {
    pub fn apply(&self, mut posts: Vec<Post>) -> Vec<Post> {
        match self {
            FeedFilter::Recent => posts.sort_by(by_recency),
            FeedFilter::Popular => posts.sort_by(|a, b| {
                b.counters
                    .popularity()
                    .cmp(&a.counters.popularity())
                    .then_with(|| by_recency(a, b))
            }),
            FeedFilter::Media(kind) => {
                posts.retain(|post| post.has_media(*kind));
                posts.sort_by(by_recency);
            }
            FeedFilter::Pinned(pinned_id) => posts.sort_by(|a, b| {
                let a_pinned = &a.id == pinned_id;
                let b_pinned = &b.id == pinned_id;
                b_pinned.cmp(&a_pinned).then_with(|| by_recency(a, b))
            }),
        }
        posts
    }
}

fn by_recency(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
