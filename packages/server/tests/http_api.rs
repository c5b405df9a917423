//! HTTP surface tests over in-memory repositories.
//!
//! The worker pool runs against scripted mocks, so sessions reach a
//! terminal state without any network or database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use research::traits::clock::SystemClock;
use research::traits::repository::SessionRepository;
use research::{
    MemoryStore, PlannerAgent, PlannerConfig, QuerySession, ResearchContext, ScriptedLLM,
    TestScenario,
};
use server_core::{build_router, AppState, WorkerPool};

const TRACE_TOKEN: &str = "test-internal-token";

fn test_state(store: Arc<MemoryStore>) -> AppState {
    let (search, fetcher) = TestScenario::new().build();
    let ctx = ResearchContext {
        search: Arc::new(search),
        fetcher: Arc::new(fetcher),
        llm: Arc::new(ScriptedLLM::new()),
        clock: Arc::new(SystemClock),
        sessions: store.clone(),
        traces: store.clone(),
        answers: store.clone(),
        cache: store.clone(),
    };
    let planner = Arc::new(PlannerAgent::new(ctx, PlannerConfig::default()));
    let (queue, _pool) = WorkerPool::spawn(planner, 1, 64);

    // The pool handle is dropped; workers keep running on the
    // channel until the queue sender is dropped with the state.
    AppState {
        sessions: store.clone(),
        traces: store.clone(),
        answers: store,
        queue,
        trace_token: Arc::new(TRACE_TOKEN.to_string()),
        db_pool: sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool"),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_query_rejects_empty_question() {
    let app = build_router(test_state(Arc::new(MemoryStore::new())));

    let response = app
        .oneshot(
            Request::post("/api/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"question": "   "}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_query_returns_session() {
    let store = Arc::new(MemoryStore::new());
    let app = build_router(test_state(store.clone()));

    let response = app
        .oneshot(
            Request::post("/api/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"question": "What year was Voyager 1 launched?"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "INIT");
    let session_id: Uuid = body["session_id"].as_str().unwrap().parse().unwrap();
    assert!(store.read_session(session_id).await.unwrap().is_some());
}

#[tokio::test]
async fn status_unknown_session_is_404() {
    let app = build_router(test_state(Arc::new(MemoryStore::new())));

    let response = app
        .oneshot(
            Request::get(format!("/api/query/{}/status", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn result_before_terminal_is_409() {
    let store = Arc::new(MemoryStore::new());
    let session = QuerySession::new("pending question", Utc::now());
    store.create_session(&session).await.unwrap();

    let app = build_router(test_state(store));
    let response = app
        .oneshot(
            Request::get(format!("/api/query/{}/result", session.session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn trace_requires_internal_token() {
    let store = Arc::new(MemoryStore::new());
    let session = QuerySession::new("traced question", Utc::now());
    store.create_session(&session).await.unwrap();

    let app = build_router(test_state(store));

    // Missing token.
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/query/{}/trace", session.session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Wrong token.
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/query/{}/trace", session.session_id))
                .header("X-Internal-Token", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Correct token.
    let response = app
        .oneshot(
            Request::get(format!("/api/query/{}/trace", session.session_id))
                .header("X-Internal-Token", TRACE_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["planner_traces"].is_array());
    assert!(body["search_logs"].is_array());
}

#[tokio::test]
async fn full_flow_serves_result_after_completion() {
    let store = Arc::new(MemoryStore::new());
    let app = build_router(test_state(store.clone()));

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"question": "Any question at all?"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    let session_id: Uuid = body["session_id"].as_str().unwrap().parse().unwrap();

    // The scripted environment returns no documents, so the worker
    // drives the session to FAILED quickly.
    let mut terminal = false;
    for _ in 0..200 {
        let session = store.read_session(session_id).await.unwrap().unwrap();
        if session.status.is_terminal() {
            terminal = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(terminal, "session never reached a terminal state");

    let response = app
        .oneshot(
            Request::get(format!("/api/query/{session_id}/result"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["confidence_level"], "LOW");
    assert_eq!(body["answer"], "Insufficient verified evidence.");
}
