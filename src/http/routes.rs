use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
}

pub fn interactions() -> Router<AppState> {
    Router::new().route("/interactions", post(handlers::submit_interaction))
}

pub fn feed() -> Router<AppState> {
    Router::new()
        .route("/posts/:owner_slug", get(handlers::list_owner_posts))
        .route("/comments/:post_id", get(handlers::list_comments))
}
