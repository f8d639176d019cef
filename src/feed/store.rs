// Post store - every database side effect of the feed lives here
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use thiserror::Error;

use crate::db::models::{Author, InteractionKind, Post, PostRecord, QuotedPost, Reply};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Sql(rusqlite::Error::QueryReturnedNoRows))
    }
}

/// Per-post counts keyed by post id. Posts with no rows are absent.
pub type CountMap = HashMap<String, i64>;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: String,
    pub content: String,
    pub tags: String,
    pub image_url: String,
    pub quoted_post_id: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub content: Option<String>,
    pub tags: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReply {
    pub post_id: String,
    pub parent_id: Option<i64>,
    pub author: String,
    pub content: String,
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    /// Non-deleted post by id; `QueryReturnedNoRows` when absent.
    async fn find_post(&self, id: &str) -> Result<Post, StoreError>;

    /// Post with author, replies and quoted post (with its author).
    async fn find_post_detail(&self, id: &str) -> Result<PostRecord, StoreError>;

    /// Newest first.
    async fn list_posts(&self, offset: i64, limit: i64) -> Result<Vec<PostRecord>, StoreError>;

    /// Newest first, with the exact number of the author's posts.
    async fn list_posts_by_author(
        &self,
        author_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<PostRecord>, i64), StoreError>;

    async fn update_post(&self, id: &str, changes: &PostChanges) -> Result<(), StoreError>;

    async fn soft_delete_post(&self, id: &str) -> Result<(), StoreError>;

    async fn count_likes(&self, post_ids: &[String]) -> Result<CountMap, StoreError>;

    async fn count_replies(&self, post_ids: &[String]) -> Result<CountMap, StoreError>;

    /// Number of live posts quoting each id.
    async fn count_quotes(&self, post_ids: &[String]) -> Result<CountMap, StoreError>;

    async fn insert_interaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
    ) -> Result<(), StoreError>;

    /// Hard delete. Returns the number of rows removed.
    async fn delete_interaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
    ) -> Result<usize, StoreError>;

    async fn has_interaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
    ) -> Result<bool, StoreError>;

    async fn find_reply(&self, id: i64) -> Result<Reply, StoreError>;

    async fn create_reply(&self, reply: NewReply) -> Result<Reply, StoreError>;
}

/// SQLite implementation
pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const AUTHOR_COLUMNS: &str = "u.id, u.username, u.display_name, u.avatar_url, u.bio";

fn post_and_author(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Post, Author)> {
    let post = Post::from_row(row)?;
    let author = Author {
        id: row.get(8)?,
        username: row.get(9)?,
        display_name: row.get(10)?,
        avatar_url: row.get(11)?,
        bio: row.get(12)?,
    };
    Ok((post, author))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Runs a `SELECT key, COUNT(*) ... IN ({ids}) GROUP BY key` query.
fn grouped_counts(
    conn: &Connection,
    sql_template: &str,
    post_ids: &[String],
) -> Result<CountMap, StoreError> {
    if post_ids.is_empty() {
        return Ok(CountMap::new());
    }

    let sql = sql_template.replace("{ids}", &placeholders(post_ids.len()));
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map(params_from_iter(post_ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<CountMap, _>>()?;
    Ok(counts)
}

fn replies_for(conn: &Connection, post_ids: &[String]) -> Result<Vec<Reply>, StoreError> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM replies
         WHERE deleted_at IS NULL AND post_id IN ({})
         ORDER BY created_at ASC, id ASC",
        Reply::COLUMNS,
        placeholders(post_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let replies = stmt
        .query_map(params_from_iter(post_ids.iter()), Reply::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(replies)
}

fn quoted_posts_for(
    conn: &Connection,
    quoted_ids: &[String],
) -> Result<HashMap<String, QuotedPost>, StoreError> {
    if quoted_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT {}, {} FROM posts p
         JOIN users u ON u.id = p.author_id
         WHERE p.deleted_at IS NULL AND p.id IN ({})",
        Post::COLUMNS,
        AUTHOR_COLUMNS,
        placeholders(quoted_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let quoted = stmt
        .query_map(params_from_iter(quoted_ids.iter()), post_and_author)?
        .map(|r| r.map(|(post, author)| (post.id.clone(), QuotedPost { post, author })))
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(quoted)
}

/// Loads replies and quoted posts for a page in two queries and stitches
/// them onto the posts, preserving the page order.
fn attach_associations(
    conn: &Connection,
    rows: Vec<(Post, Author)>,
) -> Result<Vec<PostRecord>, StoreError> {
    let ids: Vec<String> = rows.iter().map(|(p, _)| p.id.clone()).collect();
    let mut quoted_ids: Vec<String> = rows
        .iter()
        .filter_map(|(p, _)| p.quoted_post_id.clone())
        .collect();
    quoted_ids.sort();
    quoted_ids.dedup();

    let mut replies_by_post: HashMap<String, Vec<Reply>> = HashMap::new();
    for reply in replies_for(conn, &ids)? {
        replies_by_post
            .entry(reply.post_id.clone())
            .or_default()
            .push(reply);
    }
    let quoted = quoted_posts_for(conn, &quoted_ids)?;

    Ok(rows
        .into_iter()
        .map(|(post, author)| {
            let replies = replies_by_post.remove(&post.id).unwrap_or_default();
            let quoted_post = post
                .quoted_post_id
                .as_ref()
                .and_then(|id| quoted.get(id).cloned());
            PostRecord {
                post,
                author,
                quoted_post,
                replies,
            }
        })
        .collect())
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;

        let now = Utc::now();
        let post = Post {
            id: uuid::Uuid::now_v7().to_string(),
            content: new.content,
            author_id: new.author_id,
            quoted_post_id: new.quoted_post_id,
            tags: new.tags,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO posts (id, content, author_id, quoted_post_id, tags, image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                post.id,
                post.content,
                post.author_id,
                post.quoted_post_id,
                post.tags,
                post.image_url,
                post.created_at,
                post.updated_at
            ],
        )?;

        Ok(post)
    }

    async fn find_post(&self, id: &str) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM posts p WHERE p.id = ?1 AND p.deleted_at IS NULL",
            Post::COLUMNS
        );
        Ok(conn.query_row(&sql, params![id], Post::from_row)?)
    }

    async fn find_post_detail(&self, id: &str) -> Result<PostRecord, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {}, {} FROM posts p
             JOIN users u ON u.id = p.author_id
             WHERE p.id = ?1 AND p.deleted_at IS NULL",
            Post::COLUMNS,
            AUTHOR_COLUMNS
        );
        let row = conn.query_row(&sql, params![id], post_and_author)?;

        let mut records = attach_associations(&conn, vec![row])?;
        // attach_associations keeps one record per input row
        records.pop().ok_or(StoreError::Sql(rusqlite::Error::QueryReturnedNoRows))
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> Result<Vec<PostRecord>, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {}, {} FROM posts p
             JOIN users u ON u.id = p.author_id
             WHERE p.deleted_at IS NULL
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?1 OFFSET ?2",
            Post::COLUMNS,
            AUTHOR_COLUMNS
        );
        let rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, offset], post_and_author)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        attach_associations(&conn, rows)
    }

    async fn list_posts_by_author(
        &self,
        author_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<PostRecord>, i64), StoreError> {
        let conn = self.pool.get()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND deleted_at IS NULL",
            params![author_id],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {}, {} FROM posts p
             JOIN users u ON u.id = p.author_id
             WHERE p.author_id = ?1 AND p.deleted_at IS NULL
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?2 OFFSET ?3",
            Post::COLUMNS,
            AUTHOR_COLUMNS
        );
        let rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![author_id, limit, offset], post_and_author)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        Ok((attach_associations(&conn, rows)?, total))
    }

    async fn update_post(&self, id: &str, changes: &PostChanges) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE posts SET
               content = COALESCE(?1, content),
               tags = COALESCE(?2, tags),
               image_url = COALESCE(?3, image_url),
               updated_at = ?4
             WHERE id = ?5 AND deleted_at IS NULL",
            params![
                changes.content,
                changes.tags,
                changes.image_url,
                Utc::now(),
                id
            ],
        )?;
        Ok(())
    }

    async fn soft_delete_post(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE posts SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    async fn count_likes(&self, post_ids: &[String]) -> Result<CountMap, StoreError> {
        let conn = self.pool.get()?;
        grouped_counts(
            &conn,
            "SELECT post_id, COUNT(*) FROM post_interactions
             WHERE interaction_type = 'LIKE' AND deleted_at IS NULL AND post_id IN ({ids})
             GROUP BY post_id",
            post_ids,
        )
    }

    async fn count_replies(&self, post_ids: &[String]) -> Result<CountMap, StoreError> {
        let conn = self.pool.get()?;
        grouped_counts(
            &conn,
            "SELECT post_id, COUNT(*) FROM replies
             WHERE deleted_at IS NULL AND post_id IN ({ids})
             GROUP BY post_id",
            post_ids,
        )
    }

    async fn count_quotes(&self, post_ids: &[String]) -> Result<CountMap, StoreError> {
        let conn = self.pool.get()?;
        grouped_counts(
            &conn,
            "SELECT quoted_post_id, COUNT(*) FROM posts
             WHERE deleted_at IS NULL AND quoted_post_id IN ({ids})
             GROUP BY quoted_post_id",
            post_ids,
        )
    }

    async fn insert_interaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
    ) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO post_interactions (post_id, user_id, interaction_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![post_id, user_id, kind.as_str(), now, now],
        )?;
        Ok(())
    }

    async fn delete_interaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
    ) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM post_interactions
             WHERE post_id = ?1 AND user_id = ?2 AND interaction_type = ?3",
            params![post_id, user_id, kind.as_str()],
        )?;
        Ok(rows)
    }

    async fn has_interaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM post_interactions
             WHERE post_id = ?1 AND user_id = ?2 AND interaction_type = ?3 AND deleted_at IS NULL",
            params![post_id, user_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn find_reply(&self, id: i64) -> Result<Reply, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM replies WHERE id = ?1 AND deleted_at IS NULL",
            Reply::COLUMNS
        );
        Ok(conn.query_row(&sql, params![id], Reply::from_row)?)
    }

    async fn create_reply(&self, new: NewReply) -> Result<Reply, StoreError> {
        let conn = self.pool.get()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO replies (post_id, parent_id, author, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![new.post_id, new.parent_id, new.author, new.content, now, now],
        )?;

        Ok(Reply {
            id: conn.last_insert_rowid(),
            post_id: new.post_id,
            parent_id: new.parent_id,
            author: new.author,
            content: new.content,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Reads a single post back without the feed machinery; handy for asserting
/// soft-delete state in tests.
#[cfg(test)]
pub(crate) fn raw_deleted_at(pool: &DbPool, id: &str) -> Option<String> {
    use rusqlite::OptionalExtension;

    let conn = pool.get().unwrap();
    conn.query_row(
        "SELECT deleted_at FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .unwrap()
    .flatten()
}
