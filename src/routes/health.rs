use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::db;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub server: &'static str,
    pub database: &'static str,
    pub db_latency_ms: Option<u64>,
    pub uptime_secs: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let uptime_secs = state.started_at.elapsed().as_secs();

    match db::ping(&state.db) {
        Ok(latency) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                server: "up",
                database: "up",
                db_latency_ms: Some(latency.as_millis() as u64),
                uptime_secs,
            }),
        ),
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error",
                    server: "up",
                    database: "down",
                    db_latency_ms: None,
                    uptime_secs,
                }),
            )
        }
    }
}
