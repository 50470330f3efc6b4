use anyhow::{anyhow, Result};
use url::Url;

use crate::config::AppConfig;

/// Resolves stored media keys (avatars) to public URLs served by the media
/// host. Without a configured base URL, keys resolve to nothing.
#[derive(Clone, Debug, Default)]
pub struct MediaLinks {
    base: Option<Url>,
}

impl MediaLinks {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let base = match config.media_public_base_url.as_deref() {
            Some(raw) => Some(parse_base(raw)?),
            None => None,
        };
        Ok(Self { base })
    }

    pub fn from_base(raw: &str) -> Result<Self> {
        Ok(Self {
            base: Some(parse_base(raw)?),
        })
    }

    pub fn public_url(&self, key: &str) -> Option<String> {
        let base = self.base.as_ref()?;
        if key.is_empty() {
            return None;
        }
        if key.starts_with("http://") || key.starts_with("https://") {
            return Some(key.to_string());
        }
        base.join(key.trim_start_matches('/'))
            .ok()
            .map(|url| url.to_string())
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    // Url::join replaces the last path segment unless the base ends with '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|err| anyhow!("invalid MEDIA_PUBLIC_BASE_URL: {}", err))
}
