pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::auth::SessionKeys;
use crate::config::AppConfig;
use crate::infra::{cache::RedisCache, db::Db, storage::MediaLinks};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub links: MediaLinks,
    pub session_keys: SessionKeys,
    pub comment_preview_limit: i64,
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let db = Db::connect(&config.database).await?;
        let cache = RedisCache::connect(&config.redis_url).await?;
        let links = MediaLinks::new(config)?;

        Ok(Self {
            db,
            cache,
            links,
            session_keys: SessionKeys::from_config(&config.session),
            comment_preview_limit: config.feed.comment_preview_limit,
        })
    }
}
