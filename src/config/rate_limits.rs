/// Per-actor limits for interaction and feed traffic, plus the per-IP login
/// limit applied before a session exists.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub interactions_per_hour: u32,
    pub feed_requests_per_hour: u32,
    pub login_attempts_per_hour: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        RateLimits {
            interactions_per_hour: 300,
            feed_requests_per_hour: 600,
            login_attempts_per_hour: 10,
        }
    }
}

/// Actions that are counted against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Interaction,
    Feed,
    Login,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateAction::Interaction => "interaction",
            RateAction::Feed => "feed",
            RateAction::Login => "login",
        }
    }

    pub fn limit(&self, limits: &RateLimits) -> u32 {
        match self {
            RateAction::Interaction => limits.interactions_per_hour,
            RateAction::Feed => limits.feed_requests_per_hour,
            RateAction::Login => limits.login_attempts_per_hour,
        }
    }

    pub fn window(&self) -> RateWindow {
        RateWindow::Hour
    }
}

/// Time window for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Hour,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
        }
    }
}

/// Calculate current window timestamp for rate limiting
pub fn current_window(window_seconds: u64) -> u64 {
    let now = time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
    now / window_seconds
}
