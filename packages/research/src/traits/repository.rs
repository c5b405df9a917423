//! Storage repository traits.
//!
//! Narrow, transactional interfaces over the relational store. Every
//! method is one short transaction; `write_answer` commits the
//! snapshot and its evidence atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::answer::{AnswerSnapshot, Evidence, SessionResult};
use crate::types::cache::QueryCacheEntry;
use crate::types::session::{PlannerTrace, QuerySession, SearchLog, SessionStatus, SessionTrace};

/// Session lifecycle persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &QuerySession) -> Result<()>;

    async fn read_session(&self, session_id: Uuid) -> Result<Option<QuerySession>>;

    /// Advance the session status. Implementations reject regressions
    /// from terminal states.
    async fn update_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()>;
}

/// Audit-trail persistence: planner traces and search logs.
#[async_trait]
pub trait TraceRepository: Send + Sync {
    /// Append the trace row for one attempt. At most one row may exist
    /// per `(session_id, attempt_number)`.
    async fn append_planner_trace(&self, trace: &PlannerTrace) -> Result<()>;

    async fn append_search_log(&self, log: &SearchLog) -> Result<()>;

    async fn read_trace(&self, session_id: Uuid) -> Result<SessionTrace>;
}

/// Answer snapshot and evidence persistence.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Write the snapshot and bulk-write its evidence in one
    /// transaction.
    async fn write_answer(&self, snapshot: &AnswerSnapshot, evidence: &[Evidence]) -> Result<()>;

    async fn read_result(&self, session_id: Uuid) -> Result<Option<SessionResult>>;
}

/// Query cache persistence.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Fetch an unexpired entry for the fingerprint, if any.
    async fn get(&self, query_hash: &str, now: DateTime<Utc>) -> Result<Option<QueryCacheEntry>>;

    /// Store an entry unless one already exists for the same key
    /// (first writer wins). Returns whether the entry was written.
    async fn put_if_absent(&self, entry: &QueryCacheEntry) -> Result<bool>;
}
