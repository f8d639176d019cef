use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Author, Reply};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
}

impl From<Author> for PostAuthor {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            username: author.username,
            display_name: author.display_name,
            avatar_url: author.avatar_url,
            bio: author.bio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub id: i64,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reply> for ReplyResponse {
    fn from(reply: Reply) -> Self {
        Self {
            id: reply.id,
            content: reply.content,
            author: reply.author,
            created_at: reply.created_at,
            updated_at: reply.updated_at,
        }
    }
}

/// A post as rendered by every feed endpoint.
///
/// `quoted_post` carries the quoted post's id, or an empty string. The viewer
/// flags are part of the shape but never computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub content: String,
    pub tags: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: PostAuthor,
    pub replies: Vec<ReplyResponse>,
    pub quoted_post: String,
    pub likes_count: i64,
    pub replies_count: i64,
    pub reposts_count: i64,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub is_reposted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedPostsResponse {
    pub posts: Vec<PostResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub quoted_post_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub tags: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReplyRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Raw `?page=&limit=` values. Kept as strings so junk degrades to the
/// defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        parse_lenient(self.page.as_deref())
    }

    pub fn limit(&self) -> i64 {
        parse_lenient(self.limit.as_deref())
    }
}

fn parse_lenient(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_parses_numbers_and_ignores_junk() {
        let query = PageQuery {
            page: Some(" 3 ".to_string()),
            limit: Some("abc".to_string()),
        };
        assert_eq!(query.page(), 3);
        assert_eq!(query.limit(), 0);
        assert_eq!(PageQuery::default().page(), 0);
    }

    #[test]
    fn create_request_defaults_optional_fields() {
        let req: CreatePostRequest = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(req.content, "hi");
        assert!(req.tags.is_empty());
        assert!(req.image_url.is_empty());
        assert!(req.quoted_post_id.is_empty());
    }

    #[test]
    fn post_response_uses_snake_case_keys() {
        let value = serde_json::to_value(PostResponse::default()).unwrap();
        for key in [
            "image_url",
            "created_at",
            "quoted_post",
            "likes_count",
            "replies_count",
            "reposts_count",
            "is_liked",
            "is_bookmarked",
            "is_reposted",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["author"]["display_name"], "");
    }
}
