use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::app::rate_limiter::RateLimiter;
use crate::config::rate_limits::RateAction;
use crate::http::{AppError, AuthUser};
use crate::AppState;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

fn actor_action(method: &Method, path: &str) -> Option<RateAction> {
    match (method, path) {
        (&Method::POST, "/interactions") => Some(RateAction::Interaction),
        (&Method::GET, p) if p.starts_with("/posts/") || p.starts_with("/comments/") => {
            Some(RateAction::Feed)
        }
        _ => None,
    }
}

/// Per-actor fixed-window limits. Anonymous requests pass through; the
/// handlers decide whether they need a session.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let action = actor_action(request.method(), request.uri().path());

    let (action, auth_user) = match (action, auth) {
        (Some(action), Some(auth_user)) => (action, auth_user),
        _ => return Ok(next.run(request).await),
    };

    let rate_limiter = RateLimiter::new(state.cache.clone());
    let info = rate_limiter
        .check_rate_limit(auth_user.user_id, action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if info.limited {
        tracing::warn!(user_id = %auth_user.user_id, action = action.as_str(), "rate limit exceeded");
        return Err(AppError::rate_limited(format!(
            "rate limit exceeded for {}, try again later",
            action.as_str()
        )));
    }

    if let Err(err) = rate_limiter.increment(auth_user.user_id, action).await {
        tracing::warn!(error = ?err, "failed to increment rate limit counter");
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(info.limit));
    headers.insert(
        REMAINING_HEADER,
        HeaderValue::from(info.remaining.saturating_sub(1)),
    );
    Ok(response)
}

/// IP-based limit for login, where no session exists yet.
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let is_login = request.method() == Method::POST && request.uri().path() == "/auth/login";
    let addr = match (is_login, connect_info) {
        (true, Some(ConnectInfo(addr))) => addr,
        _ => return Ok(next.run(request).await),
    };

    let ip = addr.ip().to_string();
    let rate_limiter = RateLimiter::new(state.cache.clone());

    let is_limited = rate_limiter
        .check_ip_rate_limit(&ip, RateAction::Login)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if is_limited {
        tracing::warn!(ip = ip, "login rate limit exceeded");
        return Err(AppError::rate_limited(
            "too many login attempts from your address, try again later",
        ));
    }

    if let Err(err) = rate_limiter.increment_ip(&ip, RateAction::Login).await {
        tracing::warn!(error = ?err, "failed to increment IP rate limit counter");
    }

    Ok(next.run(request).await)
}

