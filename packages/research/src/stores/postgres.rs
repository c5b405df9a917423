//! PostgreSQL storage implementation.
//!
//! Production backend for the session, trace, answer, and cache
//! repositories. All writes are short transactions; the answer
//! snapshot and its evidence commit atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{ResearchError, Result};
use crate::pipeline::strategy::SearchStrategy;
use crate::traits::repository::{
    AnswerRepository, CacheRepository, SessionRepository, TraceRepository,
};
use crate::types::answer::{AnswerSnapshot, ConfidenceLevel, Evidence, SessionResult};
use crate::types::cache::QueryCacheEntry;
use crate::types::claim::{ClaimStatus, VerifiedClaim};
use crate::types::session::{PlannerTrace, QuerySession, SearchLog, SessionStatus, SessionTrace};

fn storage_err(e: sqlx::Error) -> ResearchError {
    ResearchError::Storage(Box::new(e))
}

/// PostgreSQL-backed repositories.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and ensure the schema exists.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(storage_err)?;
        Self::from_pool(pool).await
    }

    /// Build from an existing pool (e.g., the server's).
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS query_sessions (
                session_id UUID PRIMARY KEY,
                question TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS planner_traces (
                session_id UUID NOT NULL REFERENCES query_sessions(session_id) ON DELETE CASCADE,
                attempt_number INT NOT NULL,
                planner_state TEXT NOT NULL,
                strategy_used TEXT NOT NULL,
                num_docs INT NOT NULL,
                decision TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (session_id, attempt_number)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS search_logs (
                id BIGSERIAL PRIMARY KEY,
                session_id UUID NOT NULL REFERENCES query_sessions(session_id) ON DELETE CASCADE,
                attempt_number INT NOT NULL,
                query_used TEXT NOT NULL,
                num_docs INT NOT NULL,
                success BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS answer_snapshots (
                session_id UUID PRIMARY KEY REFERENCES query_sessions(session_id) ON DELETE CASCADE,
                answer_text TEXT NOT NULL,
                confidence_level TEXT NOT NULL,
                confidence_reason TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS evidence (
                id BIGSERIAL PRIMARY KEY,
                session_id UUID NOT NULL REFERENCES query_sessions(session_id) ON DELETE CASCADE,
                canonical_text TEXT NOT NULL,
                status TEXT NOT NULL,
                supporting_urls JSONB NOT NULL DEFAULT '[]',
                opposing_urls JSONB NOT NULL DEFAULT '[]',
                distinct_domains INT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS query_cache (
                query_hash TEXT PRIMARY KEY,
                snapshot JSONB NOT NULL,
                evidence JSONB NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_evidence_session ON evidence(session_id)",
            "CREATE INDEX IF NOT EXISTS idx_search_logs_session ON search_logs(session_id)",
            "CREATE INDEX IF NOT EXISTS idx_query_cache_expires ON query_cache(expires_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for PostgresStore {
    async fn create_session(&self, session: &QuerySession) -> Result<()> {
        sqlx::query(
            "INSERT INTO query_sessions (session_id, question, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.session_id)
        .bind(&session.question)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn read_session(&self, session_id: Uuid) -> Result<Option<QuerySession>> {
        let row = sqlx::query(
            "SELECT session_id, question, status, created_at, updated_at
             FROM query_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(|row| {
            let status: String = row.get("status");
            Ok(QuerySession {
                session_id: row.get("session_id"),
                question: row.get("question"),
                status: SessionStatus::parse(&status).ok_or_else(|| {
                    ResearchError::Invariant {
                        reason: format!("unknown session status in store: {status}"),
                    }
                })?,
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
        })
        .transpose()
    }

    async fn update_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        // Terminal states are never left; the WHERE clause makes the
        // guard atomic with the write.
        let result = sqlx::query(
            "UPDATE query_sessions SET status = $2, updated_at = NOW()
             WHERE session_id = $1 AND status NOT IN ('DONE', 'FAILED')",
        )
        .bind(session_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(ResearchError::Invariant {
                reason: format!("session {session_id} is terminal or missing"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TraceRepository for PostgresStore {
    async fn append_planner_trace(&self, trace: &PlannerTrace) -> Result<()> {
        sqlx::query(
            "INSERT INTO planner_traces
             (session_id, attempt_number, planner_state, strategy_used, num_docs, decision, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(trace.session_id)
        .bind(trace.attempt_number as i32)
        .bind(trace.planner_state.as_str())
        .bind(trace.strategy_used.as_str())
        .bind(trace.num_docs as i32)
        .bind(trace.decision.as_str())
        .bind(trace.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn append_search_log(&self, log: &SearchLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO search_logs
             (session_id, attempt_number, query_used, num_docs, success, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(log.session_id)
        .bind(log.attempt_number as i32)
        .bind(&log.query_used)
        .bind(log.num_docs as i32)
        .bind(log.success)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn read_trace(&self, session_id: Uuid) -> Result<SessionTrace> {
        let trace_rows = sqlx::query(
            "SELECT session_id, attempt_number, planner_state, strategy_used, num_docs, decision, created_at
             FROM planner_traces WHERE session_id = $1 ORDER BY attempt_number",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let planner_traces = trace_rows
            .into_iter()
            .map(|row| {
                let state: String = row.get("planner_state");
                let strategy: String = row.get("strategy_used");
                let decision: String = row.get("decision");
                PlannerTrace {
                    session_id: row.get("session_id"),
                    attempt_number: row.get::<i32, _>("attempt_number") as u32,
                    planner_state: SessionStatus::parse(&state).unwrap_or(SessionStatus::Failed),
                    strategy_used: SearchStrategy::parse(&strategy)
                        .unwrap_or(SearchStrategy::Verbatim),
                    num_docs: row.get::<i32, _>("num_docs") as u32,
                    decision: crate::types::session::VerificationDecision::parse(&decision)
                        .unwrap_or(crate::types::session::VerificationDecision::Stop),
                    created_at: row.get("created_at"),
                }
            })
            .collect();

        let log_rows = sqlx::query(
            "SELECT session_id, attempt_number, query_used, num_docs, success, created_at
             FROM search_logs WHERE session_id = $1 ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let search_logs = log_rows
            .into_iter()
            .map(|row| SearchLog {
                session_id: row.get("session_id"),
                attempt_number: row.get::<i32, _>("attempt_number") as u32,
                query_used: row.get("query_used"),
                num_docs: row.get::<i32, _>("num_docs") as u32,
                success: row.get("success"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(SessionTrace {
            planner_traces,
            search_logs,
        })
    }
}

#[async_trait]
impl AnswerRepository for PostgresStore {
    async fn write_answer(&self, snapshot: &AnswerSnapshot, evidence: &[Evidence]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO answer_snapshots
             (session_id, answer_text, confidence_level, confidence_reason, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (session_id) DO NOTHING",
        )
        .bind(snapshot.session_id)
        .bind(&snapshot.answer_text)
        .bind(snapshot.confidence_level.as_str())
        .bind(&snapshot.confidence_reason)
        .bind(snapshot.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        for item in evidence {
            sqlx::query(
                "INSERT INTO evidence
                 (session_id, canonical_text, status, supporting_urls, opposing_urls, distinct_domains)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.session_id)
            .bind(&item.claim.canonical_text)
            .bind(item.claim.status.as_str())
            .bind(serde_json::to_value(&item.claim.supporting_urls)?)
            .bind(serde_json::to_value(&item.claim.opposing_urls)?)
            .bind(item.claim.distinct_domains as i32)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn read_result(&self, session_id: Uuid) -> Result<Option<SessionResult>> {
        let snapshot_row = sqlx::query(
            "SELECT session_id, answer_text, confidence_level, confidence_reason, created_at
             FROM answer_snapshots WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = snapshot_row else {
            return Ok(None);
        };

        let level: String = row.get("confidence_level");
        let snapshot = AnswerSnapshot {
            session_id: row.get("session_id"),
            answer_text: row.get("answer_text"),
            confidence_level: ConfidenceLevel::parse(&level).unwrap_or(ConfidenceLevel::Low),
            confidence_reason: row.get("confidence_reason"),
            created_at: row.get("created_at"),
        };

        let evidence_rows = sqlx::query(
            "SELECT session_id, canonical_text, status, supporting_urls, opposing_urls, distinct_domains
             FROM evidence WHERE session_id = $1 ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let evidence = evidence_rows
            .into_iter()
            .map(|row| {
                let status: String = row.get("status");
                let supporting: serde_json::Value = row.get("supporting_urls");
                let opposing: serde_json::Value = row.get("opposing_urls");
                Ok(Evidence {
                    session_id: row.get("session_id"),
                    claim: VerifiedClaim {
                        canonical_text: row.get("canonical_text"),
                        status: ClaimStatus::parse(&status).unwrap_or(ClaimStatus::Unverified),
                        supporting_urls: serde_json::from_value(supporting)?,
                        opposing_urls: serde_json::from_value(opposing)?,
                        distinct_domains: row.get::<i32, _>("distinct_domains") as usize,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(SessionResult { snapshot, evidence }))
    }
}

#[async_trait]
impl CacheRepository for PostgresStore {
    async fn get(&self, query_hash: &str, now: DateTime<Utc>) -> Result<Option<QueryCacheEntry>> {
        let row = sqlx::query(
            "SELECT query_hash, snapshot, evidence, expires_at
             FROM query_cache WHERE query_hash = $1 AND expires_at > $2",
        )
        .bind(query_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(|row| {
            let snapshot: serde_json::Value = row.get("snapshot");
            let evidence: serde_json::Value = row.get("evidence");
            Ok(QueryCacheEntry {
                query_hash: row.get("query_hash"),
                snapshot: serde_json::from_value(snapshot)?,
                evidence: serde_json::from_value(evidence)?,
                expires_at: row.get("expires_at"),
            })
        })
        .transpose()
    }

    async fn put_if_absent(&self, entry: &QueryCacheEntry) -> Result<bool> {
        // First writer wins for the same key.
        let result = sqlx::query(
            "INSERT INTO query_cache (query_hash, snapshot, evidence, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (query_hash) DO NOTHING",
        )
        .bind(&entry.query_hash)
        .bind(serde_json::to_value(&entry.snapshot)?)
        .bind(serde_json::to_value(&entry.evidence)?)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }
}
