//! Client-side reconciliation: optimistic interaction state, feed paging and
//! the HTTP binding to the server endpoints.

pub mod api;
pub mod feed;
pub mod reconcile;
pub mod session;
pub mod store;

pub use api::{ApiError, HttpApi, InteractionApi};
pub use feed::{FeedFilter, FeedView, Pager};
pub use reconcile::{BeginError, Phase, PostInteractionState, PostView};
pub use session::{InteractionSession, Settled};
pub use store::{FeedStore, Notice, Ticket};
