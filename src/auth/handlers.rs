use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{password, session};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::users::{self, UserResponse};

// -- Request types --

#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct SignupResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Serialize)]
pub struct SigninResponse {
    pub token: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

// -- Handlers --

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    let secret = req.password.trim().to_string();
    if username.is_empty() || email.is_empty() || secret.is_empty() {
        return Err(AppError::Validation(
            "username, email, and password cannot be empty".into(),
        ));
    }

    if users::email_taken(&state.db, &email)? {
        return Err(AppError::Conflict("email already in use".into()));
    }
    if users::username_taken(&state.db, &username)? {
        return Err(AppError::Conflict("username already in use".into()));
    }

    let hash = tokio::task::spawn_blocking(move || password::hash_password(&secret))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let user = users::insert_user(&state.db, &username, &email, &hash)?;
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &user.id, hours)?;
    tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

    let cookie = session_cookie(&state.config.auth.cookie_name, &token, hours);
    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(SignupResponse {
            user: user.into(),
            token,
        }),
    )
        .into_response())
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<Response> {
    let invalid = || AppError::Unauthenticated("invalid credentials".into());

    let email = req.email.trim().to_string();
    let user = users::find_by_email(&state.db, &email)?.ok_or_else(invalid)?;

    let secret = req.password.trim().to_string();
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&secret, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(invalid());
    }

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &user.id, hours)?;
    tracing::info!(user_id = %user.id, "User signed in");

    let cookie = session_cookie(&state.config.auth.cookie_name, &token, hours);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(SigninResponse { token }),
    )
        .into_response())
}

pub async fn signout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    session::delete_session(&state.db, &user.token)?;
    tracing::info!(user_id = %user.id, "User signed out");

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )]),
    )
        .into_response())
}
