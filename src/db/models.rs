use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "id, username, email, password_hash, role, display_name, \
         avatar_url, bio, location, created_at, updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            display_name: row.get(5)?,
            avatar_url: row.get(6)?,
            bio: row.get(7)?,
            location: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub quoted_post_id: Option<String>,
    pub tags: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Column list for a `posts` table aliased as `p`.
    pub const COLUMNS: &'static str =
        "p.id, p.content, p.author_id, p.quoted_post_id, p.tags, p.image_url, p.created_at, p.updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            author_id: row.get(2)?,
            quoted_post_id: row.get(3)?,
            tags: row.get(4)?,
            image_url: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

/// Public slice of a user embedded in post responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: i64,
    pub post_id: String,
    pub parent_id: Option<i64>,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reply {
    pub const COLUMNS: &'static str =
        "id, post_id, parent_id, author, content, created_at, updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            parent_id: row.get(2)?,
            author: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Like,
    /// Reserved, never written.
    Dislike,
    Bookmark,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "LIKE",
            InteractionKind::Dislike => "DISLIKE",
            InteractionKind::Bookmark => "BOOKMARK",
        }
    }
}

/// A post with the associations the feed renders.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post: Post,
    pub author: Author,
    pub quoted_post: Option<QuotedPost>,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone)]
pub struct QuotedPost {
    pub post: Post,
    pub author: Author,
}
