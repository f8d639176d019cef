pub mod auth;
pub mod health;
pub mod posts;
pub mod recommendations;
pub mod users;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP surface, mounted under `/api`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(recommendations::router());

    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::events::LogPublisher;
    use crate::feed::{PostService, SqlitePostStore};
    use crate::recommend::DisabledRecommender;

    fn test_state(pool: crate::state::DbPool) -> AppState {
        let posts = PostService::new(
            Arc::new(SqlitePostStore::new(pool.clone())),
            Arc::new(LogPublisher),
        );
        AppState {
            db: pool,
            config: Config::default(),
            posts: Arc::new(posts),
            recommender: Arc::new(DisabledRecommender),
            started_at: Instant::now(),
        }
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        let (_tmp, pool) = test_pool();
        app(test_state(pool))
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn routes_are_mounted_under_api() {
        let req = Request::get("/api/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(req).await, StatusCode::OK);

        let req = Request::get("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(req).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_feed_lists_fine() {
        let req = Request::get("/api/v1/posts").body(Body::empty()).unwrap();
        assert_eq!(status_of(req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn writes_without_session_are_401() {
        for (method, uri) in [
            ("POST", "/api/v1/posts"),
            ("POST", "/api/v1/posts/0190a5a0-0000-7000-8000-000000000000/like"),
            ("DELETE", "/api/v1/posts/0190a5a0-0000-7000-8000-000000000000/unbookmark"),
            ("GET", "/api/v1/users/me"),
            ("POST", "/api/v1/auth/signout"),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap();
            assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }
}
