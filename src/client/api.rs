//! Client side of the interaction and feed endpoints.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::domain::interaction::{
    Comment, ErrorClass, ErrorCode, InteractionRequest, InteractionResponse,
};
use crate::domain::post::{CommentsPage, Post, PostsPage};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a readable envelope.
    #[error("network error: {0}")]
    Transport(String),
    #[error("{message}")]
    Rejected { code: ErrorCode, message: String },
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) => ErrorClass::Transient,
            Self::Rejected { code, .. } => code.class(),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Transport(_) => None,
            Self::Rejected { code, .. } => Some(*code),
        }
    }

    pub fn is_duplicate_reaction(&self) -> bool {
        self.code() == Some(ErrorCode::DuplicateReaction)
    }

    fn rejected(code: Option<ErrorCode>, message: String) -> Self {
        Self::Rejected {
            code: code.unwrap_or(ErrorCode::Internal),
            message,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Turns an `ok: false` envelope into an error.
pub fn into_result(response: InteractionResponse) -> Result<InteractionResponse, ApiError> {
    if response.ok {
        Ok(response)
    } else {
        Err(ApiError::rejected(response.code, response.message))
    }
}

/// The three calls the feed needs. Implemented over HTTP by [`HttpApi`] and
/// by in-memory fakes in tests.
pub trait InteractionApi: Send + Sync {
    fn submit(
        &self,
        request: InteractionRequest,
    ) -> impl Future<Output = Result<InteractionResponse, ApiError>> + Send;

    fn fetch_posts(
        &self,
        owner_slug: &str,
        skip: i64,
        take: i64,
    ) -> impl Future<Output = Result<Vec<Post>, ApiError>> + Send;

    fn fetch_comments(
        &self,
        post_id: &str,
        skip: i64,
        take: i64,
    ) -> impl Future<Output = Result<Vec<Comment>, ApiError>> + Send;
}

/// `reqwest` client for a running server. Cheap to clone.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Error statuses still carry the envelope, so the body is decoded either way.
async fn envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::Transport(format!("unreadable response ({}): {}", status, err)))
}

impl InteractionApi for HttpApi {
    async fn submit(&self, request: InteractionRequest) -> Result<InteractionResponse, ApiError> {
        let response = self
            .auth(self.client.post(self.url("/interactions")))
            .json(&request)
            .send()
            .await?;
        into_result(envelope(response).await?)
    }

    async fn fetch_posts(
        &self,
        owner_slug: &str,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Post>, ApiError> {
        let response = self
            .auth(self.client.get(self.url(&format!("/posts/{}", owner_slug))))
            .query(&[("skip", skip), ("take", take)])
            .send()
            .await?;
        let page: PostsPage = envelope(response).await?;
        if page.ok {
            Ok(page.posts)
        } else {
            Err(ApiError::rejected(page.code, page.message))
        }
    }

    async fn fetch_comments(
        &self,
        post_id: &str,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Comment>, ApiError> {
        let response = self
            .auth(self.client.get(self.url(&format!("/comments/{}", post_id))))
            .query(&[("skip", skip), ("take", take)])
            .send()
            .await?;
        let page: CommentsPage = envelope(response).await?;
        if page.ok {
            Ok(page.comments)
        } else {
            Err(ApiError::rejected(page.code, page.message))
        }
    }
}
