//! Application state and router construction.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use research::traits::repository::{AnswerRepository, SessionRepository, TraceRepository};

use crate::routes::{health, query};
use crate::worker::JobQueue;

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionRepository>,
    pub traces: Arc<dyn TraceRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub queue: JobQueue,
    pub trace_token: Arc<String>,
    pub db_pool: PgPool,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/query", post(query::create_query_handler))
        .route("/api/query/:session_id/status", get(query::status_handler))
        .route("/api/query/:session_id/result", get(query::result_handler))
        .route("/api/query/:session_id/trace", get(query::trace_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
