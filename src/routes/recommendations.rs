use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::feed::dto::PostResponse;
use crate::feed::PageRequest;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RecommendationQuery {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub topic: String,
    pub limit: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/recommendation/posts", get(recommended_posts))
}

async fn recommended_posts(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let user_id = query.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id is required".into()));
    }

    let limit = query
        .limit
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    let limit = PageRequest::new(1, limit).limit;

    let posts = state
        .recommender
        .recommend(user_id, query.topic.trim(), limit)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}
