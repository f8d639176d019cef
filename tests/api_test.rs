use std::sync::Arc;
use std::time::Instant;

use forum_server::config::Config;
use forum_server::db;
use forum_server::events::LogPublisher;
use forum_server::feed::{PostService, SqlitePostStore};
use forum_server::recommend::DisabledRecommender;
use forum_server::routes;
use forum_server::state::AppState;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestApp {
    base: String,
    client: Client,
    _tmp: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base, path)
    }

    /// Signs up `username` and returns (user id, bearer token).
    async fn signup(&self, username: &str) -> (String, String) {
        let resp = self
            .client
            .post(self.url("/v1/auth/signup"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "correct horse",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn create_post(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/v1/posts"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

async fn spawn_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let pool = db::create_pool(&tmp.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let config = Config::default();

    let posts = PostService::new(
        Arc::new(SqlitePostStore::new(pool.clone())),
        Arc::new(LogPublisher),
    );
    let state = AppState {
        db: pool,
        config,
        posts: Arc::new(posts),
        recommender: Arc::new(DisabledRecommender),
        started_at: Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        client: Client::new(),
        _tmp: tmp,
    }
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn signup_signin_round_trip() {
    let app = spawn_app().await;
    app.signup("alice").await;

    let resp = app
        .client
        .post(app.url("/v1/auth/signin"))
        .json(&json!({ "email": "alice@example.com", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);

    let me: Value = app
        .client
        .get(app.url("/v1/users/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "alice");
    assert_eq!(me["displayName"], "alice");
}

#[tokio::test]
async fn signin_with_wrong_password_is_401() {
    let app = spawn_app().await;
    app.signup("alice").await;

    let resp = app
        .client
        .post(app.url("/v1/auth/signin"))
        .json(&json!({ "email": "alice@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid credentials");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = spawn_app().await;
    app.signup("alice").await;

    let resp = app
        .client
        .post(app.url("/v1/auth/signup"))
        .json(&json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "whatever",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "email already in use");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = spawn_app().await;

    let resp = app
        .create_post("not-a-real-token", json!({ "content": "hi" }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .client
        .post(app.url("/v1/posts"))
        .json(&json!({ "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn signout_invalidates_the_token() {
    let app = spawn_app().await;
    let (_, token) = app.signup("alice").await;

    let resp = app
        .client
        .post(app.url("/v1/auth/signout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .client
        .get(app.url("/v1/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_then_get_post() {
    let app = spawn_app().await;
    let (alice_id, token) = app.signup("alice").await;

    let resp = app
        .create_post(&token, json!({ "content": "Hello test", "tags": "intro" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let fetched: Value = app
        .client
        .get(app.url(&format!("/v1/posts/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["content"], "Hello test");
    assert_eq!(fetched["tags"], "intro");
    assert_eq!(fetched["author"]["id"], alice_id.as_str());
    assert_eq!(fetched["author"]["username"], "alice");
    assert_eq!(fetched["likes_count"], 0);
    assert_eq!(fetched["quoted_post"], "");
    assert_eq!(fetched["is_liked"], false);
}

#[tokio::test]
async fn get_post_error_statuses() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(app.url("/v1/posts/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .client
        .get(app.url(&format!("/v1/posts/{}", uuid::Uuid::now_v7())))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "post not found");
}

#[tokio::test]
async fn quoting_a_post() {
    let app = spawn_app().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let a: Value = app
        .create_post(&alice, json!({ "content": "original" }))
        .await
        .json()
        .await
        .unwrap();
    let a_id = a["id"].as_str().unwrap();

    let resp = app
        .create_post(&bob, json!({ "content": "quoting", "quoted_post_id": a_id }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let b: Value = resp.json().await.unwrap();
    assert_eq!(b["quoted_post"], a_id);

    let a_again: Value = app
        .client
        .get(app.url(&format!("/v1/posts/{a_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(a_again["reposts_count"], 1);

    let resp = app
        .create_post(
            &bob,
            json!({ "content": "ghost", "quoted_post_id": uuid::Uuid::now_v7().to_string() }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "quoted post not found");
}

#[tokio::test]
async fn like_twice_is_a_conflict() {
    let app = spawn_app().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let post: Value = app
        .create_post(&alice, json!({ "content": "like me" }))
        .await
        .json()
        .await
        .unwrap();
    let like_url = app.url(&format!("/v1/posts/{}/like", post["id"].as_str().unwrap()));

    let resp = app
        .client
        .post(&like_url)
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .client
        .post(&like_url)
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "post already liked");

    let unlike_url = app.url(&format!("/v1/posts/{}/unlike", post["id"].as_str().unwrap()));
    let resp = app
        .client
        .delete(&unlike_url)
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn non_author_cannot_edit_or_delete() {
    let app = spawn_app().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let post: Value = app
        .create_post(&alice, json!({ "content": "mine" }))
        .await
        .json()
        .await
        .unwrap();
    let post_url = app.url(&format!("/v1/posts/{}", post["id"].as_str().unwrap()));

    let resp = app
        .client
        .put(&post_url)
        .bearer_auth(&bob)
        .json(&json!({ "content": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .delete(&post_url)
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .delete(&post_url)
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.client.get(&post_url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replies_increase_replies_count() {
    let app = spawn_app().await;
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let post: Value = app
        .create_post(&alice, json!({ "content": "discuss" }))
        .await
        .json()
        .await
        .unwrap();
    let id = post["id"].as_str().unwrap();

    let resp = app
        .client
        .post(app.url(&format!("/v1/posts/{id}/replies")))
        .bearer_auth(&bob)
        .json(&json!({ "content": "great post" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let reply: Value = resp.json().await.unwrap();
    assert_eq!(reply["author"], "bob");

    let fetched: Value = app
        .client
        .get(app.url(&format!("/v1/posts/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["replies_count"], 1);
    assert_eq!(fetched["replies"][0]["content"], "great post");
}

#[tokio::test]
async fn listing_coerces_bad_paging_params() {
    let app = spawn_app().await;
    let (alice_id, alice) = app.signup("alice").await;

    for i in 0..3 {
        app.create_post(&alice, json!({ "content": format!("post {i}") }))
            .await;
    }

    let page: Value = app
        .client
        .get(app.url("/v1/posts?page=-2&limit=abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["page"], 1);
    assert_eq!(page["limit"], 10);
    assert_eq!(page["posts"].as_array().unwrap().len(), 3);
    assert_eq!(page["posts"][0]["content"], "post 2");
    assert_eq!(page["has_prev_page"], false);

    let by_user: Value = app
        .client
        .get(app.url(&format!("/v1/posts/user/{alice_id}?page=1&limit=2")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_user["total"], 3);
    assert_eq!(by_user["total_pages"], 2);
    assert_eq!(by_user["has_next_page"], true);
}

#[tokio::test]
async fn recommendations_validate_and_report_upstream_failure() {
    let app = spawn_app().await;
    let (alice_id, alice) = app.signup("alice").await;

    let resp = app
        .client
        .get(app.url("/v1/recommendation/posts"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .client
        .get(app.url(&format!("/v1/recommendation/posts?user_id={alice_id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn profile_update_applies_non_blank_fields() {
    let app = spawn_app().await;
    let (alice_id, alice) = app.signup("alice").await;

    let resp = app
        .client
        .put(app.url("/v1/users/me"))
        .bearer_auth(&alice)
        .json(&json!({ "bio": "rustacean", "displayName": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let user: Value = app
        .client
        .get(app.url(&format!("/v1/users/{alice_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user["bio"], "rustacean");
    assert_eq!(user["displayName"], "alice");

    let users: Value = app
        .client
        .get(app.url("/v1/users"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.as_array().unwrap().len(), 1);
}
