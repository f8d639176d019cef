use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            location: user.location,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Profile edit; blank fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub avatar_url: String,
}

pub fn insert_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<User> {
    let conn = pool.get()?;
    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role: "user".to_string(),
        display_name: username.to_string(),
        avatar_url: String::new(),
        bio: String::new(),
        location: String::new(),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id,
            user.username,
            user.email,
            user.password_hash,
            user.role,
            user.display_name,
            user.created_at,
            user.updated_at
        ],
    )
    .map_err(unique_violation)?;

    Ok(user)
}

/// A signup that loses the race past the `*_taken` checks still reports which
/// value is in use.
fn unique_violation(err: rusqlite::Error) -> AppError {
    let taken = match &err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            if msg.contains("users.email") {
                Some("email already in use")
            } else if msg.contains("users.username") {
                Some("username already in use")
            } else {
                None
            }
        }
        _ => None,
    };
    match taken {
        Some(msg) => AppError::Conflict(msg.into()),
        None => AppError::Database(err),
    }
}

pub fn find_by_id(pool: &DbPool, id: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);
    Ok(conn.query_row(&sql, params![id], User::from_row).optional()?)
}

pub fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS);
    Ok(conn.query_row(&sql, params![email], User::from_row).optional()?)
}

pub fn email_taken(pool: &DbPool, email: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?)
}

pub fn username_taken(pool: &DbPool, username: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?)
}

pub fn list_users(pool: &DbPool) -> AppResult<Vec<User>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {} FROM users ORDER BY created_at ASC", User::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([], User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Applies the non-blank fields of `update` and returns the stored row.
pub fn update_profile(
    pool: &DbPool,
    id: &str,
    update: &UpdateProfileRequest,
) -> AppResult<Option<User>> {
    fn present(value: &str) -> Option<&str> {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }

    {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE users SET
               display_name = COALESCE(?1, display_name),
               bio = COALESCE(?2, bio),
               location = COALESCE(?3, location),
               avatar_url = COALESCE(?4, avatar_url),
               updated_at = ?5
             WHERE id = ?6",
            params![
                present(&update.display_name),
                present(&update.bio),
                present(&update.location),
                present(&update.avatar_url),
                Utc::now(),
                id
            ],
        )?;
    }

    find_by_id(pool, id)
}
