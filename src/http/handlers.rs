use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::app::auth::AuthService;
use crate::app::feed::FeedService;
use crate::app::interactions::{InteractionService, ValidatedInteraction};
use crate::domain::ids::{is_valid_public_id, is_valid_slug};
use crate::domain::interaction::{InteractionRequest, InteractionResponse};
use crate::domain::post::{CommentsPage, PostsPage};
use crate::http::{AppError, AuthUser};
use crate::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

impl PageQuery {
    fn resolve(&self) -> Result<(i64, i64), AppError> {
        let skip = self.skip.unwrap_or(0);
        let take = self.take.unwrap_or(DEFAULT_PAGE_SIZE);
        if skip < 0 {
            return Err(AppError::bad_request("skip must not be negative"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&take) {
            return Err(AppError::bad_request(format!(
                "take must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok((skip, take))
    }
}

fn page_query(query: Result<Query<PageQuery>, QueryRejection>) -> Result<(i64, i64), AppError> {
    let Query(query) = query.map_err(|_| AppError::bad_request("skip and take must be integers"))?;
    query.resolve()
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(state.db.clone(), state.session_keys);
    let tokens = service
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = AuthService::new(state.db.clone(), state.session_keys);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = AuthService::new(state.db.clone(), state.session_keys);
    let revoked = service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    if !revoked {
        tracing::debug!("revoke requested for unknown or already revoked token");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /interactions`. The session is checked before the body is even
/// looked at.
pub async fn submit_interaction(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    payload: Result<Json<InteractionRequest>, JsonRejection>,
) -> Result<Json<InteractionResponse>, AppError> {
    let auth = auth.ok_or_else(|| AppError::unauthorized("sign in to interact with posts"))?;

    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected interaction body");
        AppError::bad_request("malformed interaction request")
    })?;

    let validated = ValidatedInteraction::try_from(request)?;
    let kind = validated.interaction.kind();

    let service = InteractionService::new(state.db.clone(), state.links.clone());
    let outcome = service.apply(auth.user_id, validated).await.map_err(|err| {
        tracing::debug!(actor_id = %auth.user_id, kind = ?kind, error = %err, "interaction rejected");
        AppError::from(err)
    })?;

    Ok(Json(InteractionResponse::from(outcome)))
}

/// `GET /posts/{ownerSlug}`. Unknown owners get an empty page.
pub async fn list_owner_posts(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(owner_slug): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PostsPage>, AppError> {
    if !is_valid_slug(&owner_slug) {
        return Err(AppError::bad_request("invalid owner slug"));
    }
    let (skip, take) = page_query(query)?;

    let service = FeedService::new(
        state.db.clone(),
        state.links.clone(),
        state.comment_preview_limit,
    );
    let posts = service
        .list_owner_posts(&owner_slug, auth.map(|auth| auth.user_id), skip, take)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, owner_slug = %owner_slug, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    Ok(Json(PostsPage {
        ok: true,
        message: format!("{} posts", posts.len()),
        code: None,
        posts,
    }))
}

/// `GET /comments/{postId}`, newest first.
pub async fn list_comments(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(post_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<CommentsPage>, AppError> {
    if !is_valid_public_id(&post_id) {
        return Err(AppError::bad_request("invalid post id"));
    }
    let (skip, take) = page_query(query)?;

    let service = FeedService::new(
        state.db.clone(),
        state.links.clone(),
        state.comment_preview_limit,
    );
    let comments = service
        .list_comments(&post_id, auth.map(|auth| auth.user_id), skip, take)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?
        .ok_or_else(AppError::post_not_found)?;

    Ok(Json(CommentsPage {
        ok: true,
        message: format!("{} comments", comments.len()),
        code: None,
        comments,
    }))
}
