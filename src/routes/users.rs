use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::users::{self, UpdateProfileRequest, UserResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", get(list_users))
        .route("/v1/users/me", get(get_me).put(update_me))
        .route("/v1/users/{id}", get(get_user))
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = users::list_users(&state.db)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let id = uuid::Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("invalid user ID".into()))?
        .to_string();
    let user = users::find_by_id(&state.db, &id)?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(Json(user.into()))
}

async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UserResponse>> {
    let me = users::find_by_id(&state.db, &user.id)?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(Json(me.into()))
}

async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    if !req.avatar_url.trim().is_empty() && url::Url::parse(req.avatar_url.trim()).is_err() {
        return Err(AppError::Validation("avatarUrl must be a valid URL".into()));
    }

    let me = users::update_profile(&state.db, &user.id, &req)?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(Json(me.into()))
}
