use std::sync::Arc;

use crate::db::models::{InteractionKind, PostRecord};
use crate::error::{AppError, AppResult};
use crate::events::{EventPublisher, PostCreated, POST_CREATE_TOPIC};

use super::dto::{
    CreatePostRequest, CreateReplyRequest, PaginatedPostsResponse, PostResponse, ReplyResponse,
    UpdatePostRequest,
};
use super::store::{CountMap, NewPost, NewReply, PostChanges, PostStore, StoreError};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_CONTENT_CHARS: usize = 2000;

/// A page request with out-of-range values already coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        let page = if page <= 0 { DEFAULT_PAGE } else { page };
        let limit = if limit <= 0 || limit > MAX_LIMIT {
            DEFAULT_LIMIT
        } else {
            limit
        };
        Self { page, limit }
    }

    /// Saturates for huge pages, which then read past the end and come back
    /// empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

pub fn paginate(posts: Vec<PostResponse>, total: i64, page: PageRequest) -> PaginatedPostsResponse {
    let total_pages = (total + page.limit - 1) / page.limit;
    PaginatedPostsResponse {
        posts,
        total,
        page: page.page,
        limit: page.limit,
        total_pages,
        has_next_page: page.page < total_pages,
        has_prev_page: page.page > 1,
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Pool(e) => AppError::Pool(e),
            StoreError::Sql(e) => AppError::Database(e),
        }
    }
}

/// Maps a missing row to `NotFound(msg)`; anything else stays a 500.
fn or_not_found(msg: &'static str) -> impl Fn(StoreError) -> AppError {
    move |err| {
        if err.is_not_found() {
            AppError::NotFound(msg.to_string())
        } else {
            AppError::from(err)
        }
    }
}

fn parse_uuid(id: &str, what: &str) -> AppResult<String> {
    uuid::Uuid::parse_str(id.trim())
        .map(|id| id.to_string())
        .map_err(|_| AppError::Validation(format!("invalid {what} ID")))
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_image_url(image_url: &str) -> AppResult<()> {
    if image_url.is_empty() {
        return Ok(());
    }
    url::Url::parse(image_url)
        .map(|_| ())
        .map_err(|_| AppError::Validation("image_url must be a valid URL".into()))
}

/// Batched per-page counts.
#[derive(Debug, Default)]
struct Counts {
    likes: CountMap,
    replies: CountMap,
    quotes: CountMap,
}

impl Counts {
    fn get(map: &CountMap, id: &str) -> i64 {
        map.get(id).copied().unwrap_or(0)
    }
}

fn to_response(record: PostRecord, counts: &Counts) -> PostResponse {
    let PostRecord {
        post,
        author,
        quoted_post,
        replies,
    } = record;

    PostResponse {
        likes_count: Counts::get(&counts.likes, &post.id),
        replies_count: Counts::get(&counts.replies, &post.id),
        reposts_count: Counts::get(&counts.quotes, &post.id),
        id: post.id,
        content: post.content,
        tags: post.tags,
        image_url: post.image_url,
        created_at: post.created_at,
        updated_at: post.updated_at,
        author: author.into(),
        replies: replies.into_iter().map(ReplyResponse::from).collect(),
        quoted_post: quoted_post.map(|q| q.post.id).unwrap_or_default(),
        is_liked: false,
        is_bookmarked: false,
        is_reposted: false,
    }
}

/// The post feed: listing, single-post views, authoring and interactions.
pub struct PostService {
    store: Arc<dyn PostStore>,
    events: Arc<dyn EventPublisher>,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    /// One grouped query per count kind, none when `ids` is empty.
    async fn load_counts(&self, ids: &[String]) -> AppResult<Counts> {
        if ids.is_empty() {
            return Ok(Counts::default());
        }
        Ok(Counts {
            likes: self.store.count_likes(ids).await?,
            replies: self.store.count_replies(ids).await?,
            quotes: self.store.count_quotes(ids).await?,
        })
    }

    async fn render(&self, records: Vec<PostRecord>) -> AppResult<Vec<PostResponse>> {
        let ids: Vec<String> = records.iter().map(|r| r.post.id.clone()).collect();
        let counts = self.load_counts(&ids).await?;
        Ok(records
            .into_iter()
            .map(|record| to_response(record, &counts))
            .collect())
    }

    /// `total` is the number of posts on the returned page, not the size of
    /// the whole feed.
    pub async fn list_posts(&self, page: PageRequest) -> AppResult<PaginatedPostsResponse> {
        let records = self.store.list_posts(page.offset(), page.limit).await?;
        let posts = self.render(records).await?;
        let total = posts.len() as i64;
        Ok(paginate(posts, total, page))
    }

    pub async fn get_post(&self, id: &str) -> AppResult<PostResponse> {
        let id = parse_uuid(id, "post")?;
        let record = self
            .store
            .find_post_detail(&id)
            .await
            .map_err(or_not_found("post not found"))?;
        let mut posts = self.render(vec![record]).await?;
        posts
            .pop()
            .ok_or_else(|| AppError::NotFound("post not found".into()))
    }

    pub async fn list_user_posts(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> AppResult<PaginatedPostsResponse> {
        let user_id = parse_uuid(user_id, "user")?;
        let (records, total) = self
            .store
            .list_posts_by_author(&user_id, page.offset(), page.limit)
            .await?;
        let posts = self.render(records).await?;
        Ok(paginate(posts, total, page))
    }

    pub async fn create_post(
        &self,
        author_id: &str,
        req: CreatePostRequest,
    ) -> AppResult<PostResponse> {
        validate_content(&req.content)?;
        validate_image_url(&req.image_url)?;

        let quoted_post_id = match req.quoted_post_id.trim() {
            "" => None,
            raw => {
                let id = uuid::Uuid::parse_str(raw)
                    .map_err(|_| AppError::NotFound("quoted post not found".into()))?
                    .to_string();
                let quoted = self
                    .store
                    .find_post(&id)
                    .await
                    .map_err(or_not_found("quoted post not found"))?;
                Some(quoted.id)
            }
        };

        let post = self
            .store
            .create_post(NewPost {
                author_id: author_id.to_string(),
                content: req.content,
                tags: req.tags,
                image_url: req.image_url,
                quoted_post_id,
            })
            .await?;
        tracing::info!(post_id = %post.id, author = %post.author_id, "Post created");

        self.publish_created(&post.id, &post.author_id, &post.content)
            .await;

        self.get_post(&post.id).await
    }

    async fn publish_created(&self, post_id: &str, author: &str, content: &str) {
        let event = PostCreated {
            post_id: post_id.to_string(),
            author: author.to_string(),
            content: content.to_string(),
        };
        let published = match event.encode() {
            Ok(payload) => self.events.publish(POST_CREATE_TOPIC, payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            tracing::warn!(post_id, "Failed to publish post-create event: {}", e);
        }
    }

    pub async fn update_post(
        &self,
        id: &str,
        caller_id: &str,
        req: UpdatePostRequest,
    ) -> AppResult<PostResponse> {
        let id = parse_uuid(id, "post")?;
        let post = self
            .store
            .find_post(&id)
            .await
            .map_err(or_not_found("post not found"))?;
        if post.author_id != caller_id {
            return Err(AppError::Unauthorized(
                "unauthorized to update this post".into(),
            ));
        }

        if let Some(content) = &req.content {
            validate_content(content)?;
        }
        if let Some(image_url) = &req.image_url {
            validate_image_url(image_url)?;
        }

        let changes = PostChanges {
            content: req.content,
            tags: req.tags,
            image_url: req.image_url,
        };
        self.store.update_post(&id, &changes).await?;

        self.get_post(&id).await
    }

    pub async fn delete_post(&self, id: &str, caller_id: &str) -> AppResult<()> {
        let id = parse_uuid(id, "post")?;
        let post = self
            .store
            .find_post(&id)
            .await
            .map_err(or_not_found("post not found"))?;
        if post.author_id != caller_id {
            return Err(AppError::Unauthorized(
                "unauthorized to delete this post".into(),
            ));
        }

        self.store.soft_delete_post(&id).await?;
        tracing::info!(post_id = %id, "Post deleted");
        Ok(())
    }

    pub async fn like_post(&self, id: &str, caller_id: &str) -> AppResult<()> {
        self.add_interaction(id, caller_id, InteractionKind::Like, "post already liked")
            .await
    }

    pub async fn unlike_post(&self, id: &str, caller_id: &str) -> AppResult<()> {
        self.remove_interaction(id, caller_id, InteractionKind::Like, "post not liked")
            .await
    }

    pub async fn bookmark_post(&self, id: &str, caller_id: &str) -> AppResult<()> {
        self.add_interaction(
            id,
            caller_id,
            InteractionKind::Bookmark,
            "post already bookmarked",
        )
        .await
    }

    pub async fn unbookmark_post(&self, id: &str, caller_id: &str) -> AppResult<()> {
        self.remove_interaction(
            id,
            caller_id,
            InteractionKind::Bookmark,
            "post not bookmarked",
        )
        .await
    }

    // Check and insert are separate round trips; two concurrent requests can
    // both pass the check.
    async fn add_interaction(
        &self,
        id: &str,
        caller_id: &str,
        kind: InteractionKind,
        conflict: &str,
    ) -> AppResult<()> {
        let id = parse_uuid(id, "post")?;
        self.store
            .find_post(&id)
            .await
            .map_err(or_not_found("post not found"))?;

        if self.store.has_interaction(&id, caller_id, kind).await? {
            return Err(AppError::Conflict(conflict.to_string()));
        }
        self.store.insert_interaction(&id, caller_id, kind).await?;
        Ok(())
    }

    async fn remove_interaction(
        &self,
        id: &str,
        caller_id: &str,
        kind: InteractionKind,
        missing: &str,
    ) -> AppResult<()> {
        let id = parse_uuid(id, "post")?;
        if !self.store.has_interaction(&id, caller_id, kind).await? {
            return Err(AppError::Conflict(missing.to_string()));
        }
        self.store.delete_interaction(&id, caller_id, kind).await?;
        Ok(())
    }

    pub async fn create_reply(
        &self,
        post_id: &str,
        author: &str,
        req: CreateReplyRequest,
    ) -> AppResult<ReplyResponse> {
        let post_id = parse_uuid(post_id, "post")?;
        validate_content(&req.content)?;
        self.store
            .find_post(&post_id)
            .await
            .map_err(or_not_found("post not found"))?;

        if let Some(parent_id) = req.parent_id {
            let parent = self
                .store
                .find_reply(parent_id)
                .await
                .map_err(or_not_found("parent reply not found"))?;
            if parent.post_id != post_id {
                return Err(AppError::NotFound("parent reply not found".into()));
            }
        }

        let reply = self
            .store
            .create_reply(NewReply {
                post_id,
                parent_id: req.parent_id,
                author: author.to_string(),
                content: req.content,
            })
            .await?;
        Ok(reply.into())
    }
}
