use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::feed::dto::{
    CreatePostRequest, CreateReplyRequest, PageQuery, PaginatedPostsResponse, PostResponse,
    ReplyResponse, UpdatePostRequest,
};
use crate::feed::PageRequest;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/posts", get(list_posts).post(create_post))
        .route(
            "/v1/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/v1/posts/user/{id}", get(list_user_posts))
        .route("/v1/posts/{id}/like", post(like_post))
        .route("/v1/posts/{id}/unlike", delete(unlike_post))
        .route("/v1/posts/{id}/bookmark", post(bookmark_post))
        .route("/v1/posts/{id}/unbookmark", delete(unbookmark_post))
        .route("/v1/posts/{id}/replies", post(create_reply))
}

fn page_request(query: &PageQuery) -> PageRequest {
    PageRequest::new(query.page(), query.limit())
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedPostsResponse>> {
    Ok(Json(state.posts.list_posts(page_request(&query)).await?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostResponse>> {
    Ok(Json(state.posts.get_post(&id).await?))
}

async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedPostsResponse>> {
    let page = state
        .posts
        .list_user_posts(&user_id, page_request(&query))
        .await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostResponse>)> {
    let post = state.posts.create_post(&user.id, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    Ok(Json(state.posts.update_post(&id, &user.id, req).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.posts.delete_post(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.posts.like_post(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.posts.unlike_post(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bookmark_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.posts.bookmark_post(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unbookmark_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.posts.unbookmark_post(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CreateReplyRequest>,
) -> AppResult<(StatusCode, Json<ReplyResponse>)> {
    let reply = state.posts.create_reply(&id, &user.username, req).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}
