//! Client for the external recommendation service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::feed::PostResponse;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecommendedPost {
    pub post_id: String,
    pub content: String,
}

impl From<RecommendedPost> for PostResponse {
    fn from(post: RecommendedPost) -> Self {
        PostResponse {
            id: post.post_id,
            content: post.content,
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("recommendation service is not configured")]
    Disabled,

    #[error("recommendation request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(
        &self,
        user_id: &str,
        topic: &str,
        limit: i64,
    ) -> Result<Vec<RecommendedPost>, RecommendError>;
}

#[derive(Deserialize)]
struct RecommendationsBody {
    #[serde(default)]
    posts: Vec<RecommendedPost>,
}

/// Calls `GET {base_url}/recommendations?user_id=&topic=&limit=`.
pub struct HttpRecommender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecommender {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RecommendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Recommender for HttpRecommender {
    async fn recommend(
        &self,
        user_id: &str,
        topic: &str,
        limit: i64,
    ) -> Result<Vec<RecommendedPost>, RecommendError> {
        let limit = limit.to_string();
        let body: RecommendationsBody = self
            .client
            .get(format!("{}/recommendations", self.base_url))
            .query(&[("user_id", user_id), ("topic", topic), ("limit", &limit)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(user_id, count = body.posts.len(), "Fetched recommendations");
        Ok(body.posts)
    }
}

/// Stand-in when no service URL is configured.
pub struct DisabledRecommender;

#[async_trait]
impl Recommender for DisabledRecommender {
    async fn recommend(
        &self,
        _user_id: &str,
        _topic: &str,
        _limit: i64,
    ) -> Result<Vec<RecommendedPost>, RecommendError> {
        Err(RecommendError::Disabled)
    }
}
