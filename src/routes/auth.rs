use axum::routing::post;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/signup", post(handlers::signup))
        .route("/v1/auth/signin", post(handlers::signin))
        .route("/v1/auth/signout", post(handlers::signout))
}
