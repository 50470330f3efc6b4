use anyhow::Result;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::config::rate_limits::{current_window, RateAction, RateLimits};
use crate::infra::cache::RedisCache;

pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self {
            cache,
            limits: RateLimits::default(),
        }
    }

    pub async fn check_rate_limit(&self, user_id: Uuid, action: RateAction) -> Result<RateLimitInfo> {
        let key = self.user_key(user_id, action);
        self.check_key(&key, action).await
    }

    /// Increment the fixed-window counter, setting its expiry on first use.
    pub async fn increment(&self, user_id: Uuid, action: RateAction) -> Result<()> {
        let key = self.user_key(user_id, action);
        self.increment_key(&key, action).await
    }

    pub async fn check_ip_rate_limit(&self, ip: &str, action: RateAction) -> Result<bool> {
        let key = self.ip_key(ip, action);
        let info = self.check_key(&key, action).await?;
        if info.limited {
            tracing::debug!(ip = ip, action = action.as_str(), "IP rate limit exceeded");
        }
        Ok(info.limited)
    }

    pub async fn increment_ip(&self, ip: &str, action: RateAction) -> Result<()> {
        let key = self.ip_key(ip, action);
        self.increment_key(&key, action).await
    }

    async fn check_key(&self, key: &str, action: RateAction) -> Result<RateLimitInfo> {
        let limit = action.limit(&self.limits);
        let mut conn = self.cache.connection().await?;
        let count: u32 = conn.get::<_, Option<u32>>(key).await?.unwrap_or(0);

        if count >= limit {
            tracing::debug!(key = key, count = count, limit = limit, "rate limit exceeded");
            return Ok(RateLimitInfo {
                limited: true,
                limit,
                remaining: 0,
            });
        }

        Ok(RateLimitInfo {
            limited: false,
            limit,
            remaining: limit - count,
        })
    }

    async fn increment_key(&self, key: &str, action: RateAction) -> Result<()> {
        let window_seconds = action.window().seconds();
        let mut conn = self.cache.connection().await?;

        let count: u32 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(key, window_seconds as i64).await?;
        }

        Ok(())
    }

    fn user_key(&self, user_id: Uuid, action: RateAction) -> String {
        format!(
            "ratelimit:{}:{}:{}",
            user_id,
            action.as_str(),
            current_window(action.window().seconds())
        )
    }

    fn ip_key(&self, ip: &str, action: RateAction) -> String {
        format!(
            "ratelimit:ip:{}:{}:{}",
            ip,
            action.as_str(),
            current_window(action.window().seconds())
        )
    }
}
