use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infra::storage::MediaLinks;

/// The fields a client needs to render who did something, resolved at
/// response time so no second round trip is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDisplay {
    pub id: Uuid,
    pub name: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ActorDisplay {
    pub fn resolve(
        id: Uuid,
        name: String,
        handle: String,
        avatar_key: Option<String>,
        links: &MediaLinks,
    ) -> Self {
        let avatar_url = avatar_key.as_deref().and_then(|key| links.public_url(key));
        Self {
            id,
            name,
            handle,
            avatar_url,
        }
    }
}
