pub mod rate_limits;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Which loop the binary runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppMode {
    Api,
    Worker,
}

impl FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "api" => Ok(AppMode::Api),
            "worker" => Ok(AppMode::Worker),
            other => Err(anyhow!("unknown APP_MODE: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub access_key: [u8; 32],
    pub refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Newest comments embedded in each post of a feed page.
    pub comment_preview_limit: i64,
    pub counter_repair_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub mode: AppMode,
    pub redis_url: String,
    pub media_public_base_url: Option<String>,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = SocketAddr::from_str(&env_or("HTTP_ADDR", "0.0.0.0:8080"))
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let mode = env_or("APP_MODE", "api").parse()?;

        Ok(Self {
            http_addr,
            mode,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            media_public_base_url: std::env::var("MEDIA_PUBLIC_BASE_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            database: DatabaseConfig::from_env()?,
            session: SessionConfig::from_env()?,
            feed: FeedConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env_or_err("DATABASE_URL")?,
            max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            connect_timeout: env_secs("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            idle_timeout: env_secs("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            max_lifetime: env_secs("DB_MAX_LIFETIME_SECONDS", "1800")?,
        })
    }
}

impl SessionConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_key: env_key_32("PASETO_ACCESS_KEY")?,
            refresh_key: env_key_32("PASETO_REFRESH_KEY")?,
            access_ttl_minutes: env_or_parse("ACCESS_TTL_MINUTES", "15")?,
            refresh_ttl_days: env_or_parse("REFRESH_TTL_DAYS", "30")?,
        })
    }
}

impl FeedConfig {
    fn from_env() -> Result<Self> {
        let comment_preview_limit: i64 = env_or_parse("COMMENT_PREVIEW_LIMIT", "5")?;
        if comment_preview_limit < 0 {
            return Err(anyhow!("invalid COMMENT_PREVIEW_LIMIT: must not be negative"));
        }
        Ok(Self {
            comment_preview_limit,
            counter_repair_interval: env_secs("COUNTER_REPAIR_INTERVAL_SECONDS", "300")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_secs(key: &str, default: &str) -> Result<Duration> {
    env_or_parse::<u64>(key, default).map(Duration::from_secs)
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let decoded = STANDARD
        .decode(env_or_err(key)?.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    <[u8; 32]>::try_from(decoded.as_slice())
        .map_err(|_| anyhow!("invalid {}: expected 32 bytes", key))
}
