//! The query API: session creation, status polling, results, and the
//! token-gated audit trace.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use research::{QuerySession, SessionStatus, ABSTENTION_TEXT};

use crate::app::AppState;
use crate::worker::RunSession;

#[derive(Deserialize)]
pub struct CreateQueryRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct CreateQueryResponse {
    pub session_id: Uuid,
    pub status: &'static str,
}

/// `POST /api/query` — create a session and enqueue it.
pub async fn create_query_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateQueryRequest>,
) -> Response {
    let question = body.question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "question must not be empty"})),
        )
            .into_response();
    }

    let session = QuerySession::new(question, Utc::now());
    if let Err(e) = state.sessions.create_session(&session).await {
        error!(error = %e, "could not persist session");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "storage unavailable"})),
        )
            .into_response();
    }

    if state
        .queue
        .enqueue(RunSession {
            session_id: session.session_id,
        })
        .is_err()
    {
        warn!(session_id = %session.session_id, "job queue full, rejecting");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "service at capacity, retry later"})),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(CreateQueryResponse {
            session_id: session.session_id,
            status: SessionStatus::Init.as_str(),
        }),
    )
        .into_response()
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub is_complete: bool,
}

/// `GET /api/query/{session_id}/status`
pub async fn status_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Response {
    match state.sessions.read_session(session_id).await {
        Ok(Some(session)) => Json(StatusResponse {
            status: session.status.as_str(),
            is_complete: session.status.is_terminal(),
        })
        .into_response(),
        Ok(None) => not_found(),
        Err(e) => storage_unavailable(e),
    }
}

#[derive(Serialize)]
pub struct EvidenceItem {
    pub claim: String,
    pub status: &'static str,
    pub source: Option<String>,
}

#[derive(Serialize)]
pub struct ResultResponse {
    pub answer: String,
    pub confidence_level: &'static str,
    pub confidence_reason: String,
    pub evidence: Vec<EvidenceItem>,
}

/// `GET /api/query/{session_id}/result` — 409 until terminal.
pub async fn result_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Response {
    let session = match state.sessions.read_session(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return not_found(),
        Err(e) => return storage_unavailable(e),
    };

    if !session.status.is_terminal() {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "session still running", "status": session.status.as_str()})),
        )
            .into_response();
    }

    match state.answers.read_result(session_id).await {
        Ok(Some(result)) => {
            let evidence = result
                .evidence
                .iter()
                .map(|e| EvidenceItem {
                    claim: e.claim.canonical_text.clone(),
                    status: e.claim.status.as_str(),
                    source: e.claim.source_urls().next().map(String::from),
                })
                .collect();
            Json(ResultResponse {
                answer: result.snapshot.answer_text,
                confidence_level: result.snapshot.confidence_level.as_str(),
                confidence_reason: result.snapshot.confidence_reason,
                evidence,
            })
            .into_response()
        }
        // A FAILED session may have crashed before its snapshot was
        // durable; it still serves the abstention document.
        Ok(None) => Json(ResultResponse {
            answer: ABSTENTION_TEXT.to_string(),
            confidence_level: "LOW",
            confidence_reason: "Session failed before an answer could be recorded.".to_string(),
            evidence: Vec::new(),
        })
        .into_response(),
        Err(e) => storage_unavailable(e),
    }
}

/// `GET /api/query/{session_id}/trace` — gated by `X-Internal-Token`.
pub async fn trace_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let presented = headers
        .get("X-Internal-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || presented != state.trace_token.as_str() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "missing or invalid internal token"})),
        )
            .into_response();
    }

    let session = match state.sessions.read_session(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return not_found(),
        Err(e) => return storage_unavailable(e),
    };

    match state.traces.read_trace(session.session_id).await {
        Ok(trace) => Json(trace).into_response(),
        Err(e) => storage_unavailable(e),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "unknown session"})),
    )
        .into_response()
}

fn storage_unavailable(e: research::ResearchError) -> Response {
    error!(error = %e, "storage error serving request");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "storage unavailable"})),
    )
        .into_response()
}
