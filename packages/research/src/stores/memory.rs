//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ResearchError, Result};
use crate::traits::repository::{
    AnswerRepository, CacheRepository, SessionRepository, TraceRepository,
};
use crate::types::answer::{AnswerSnapshot, Evidence, SessionResult};
use crate::types::cache::QueryCacheEntry;
use crate::types::session::{PlannerTrace, QuerySession, SearchLog, SessionStatus, SessionTrace};

/// In-memory repositories backing all storage traits.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<Uuid, QuerySession>>,
    traces: RwLock<Vec<PlannerTrace>>,
    search_logs: RwLock<Vec<SearchLog>>,
    answers: RwLock<HashMap<Uuid, (AnswerSnapshot, Vec<Evidence>)>>,
    cache: RwLock<HashMap<String, QueryCacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn cached_entry_count(&self) -> usize {
        self.cache.read().unwrap().len()
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(&self, session: &QuerySession) -> Result<()> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn read_session(&self, session_id: Uuid) -> Result<Option<QuerySession>> {
        Ok(self.sessions.read().unwrap().get(&session_id).cloned())
    }

    async fn update_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(ResearchError::SessionNotFound { session_id })?;

        if !session.status.can_advance_to(status) {
            warn!(
                session_id = %session_id,
                from = %session.status,
                to = %status,
                "illegal status transition rejected"
            );
            return Err(ResearchError::Invariant {
                reason: format!(
                    "cannot move session from {} to {}",
                    session.status, status
                ),
            });
        }

        session.status = status;
        session.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TraceRepository for MemoryStore {
    async fn append_planner_trace(&self, trace: &PlannerTrace) -> Result<()> {
        let mut traces = self.traces.write().unwrap();
        let duplicate = traces.iter().any(|t| {
            t.session_id == trace.session_id && t.attempt_number == trace.attempt_number
        });
        if duplicate {
            return Err(ResearchError::Invariant {
                reason: format!(
                    "trace already exists for session {} attempt {}",
                    trace.session_id, trace.attempt_number
                ),
            });
        }
        traces.push(trace.clone());
        Ok(())
    }

    async fn append_search_log(&self, log: &SearchLog) -> Result<()> {
        self.search_logs.write().unwrap().push(log.clone());
        Ok(())
    }

    async fn read_trace(&self, session_id: Uuid) -> Result<SessionTrace> {
        let planner_traces: Vec<_> = self
            .traces
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        let search_logs: Vec<_> = self
            .search_logs
            .read()
            .unwrap()
            .iter()
            .filter(|l| l.session_id == session_id)
            .cloned()
            .collect();
        Ok(SessionTrace {
            planner_traces,
            search_logs,
        })
    }
}

#[async_trait]
impl AnswerRepository for MemoryStore {
    async fn write_answer(&self, snapshot: &AnswerSnapshot, evidence: &[Evidence]) -> Result<()> {
        self.answers
            .write()
            .unwrap()
            .insert(snapshot.session_id, (snapshot.clone(), evidence.to_vec()));
        Ok(())
    }

    async fn read_result(&self, session_id: Uuid) -> Result<Option<SessionResult>> {
        Ok(self
            .answers
            .read()
            .unwrap()
            .get(&session_id)
            .map(|(snapshot, evidence)| SessionResult {
                snapshot: snapshot.clone(),
                evidence: evidence.clone(),
            }))
    }
}

#[async_trait]
impl CacheRepository for MemoryStore {
    async fn get(&self, query_hash: &str, now: DateTime<Utc>) -> Result<Option<QueryCacheEntry>> {
        Ok(self
            .cache
            .read()
            .unwrap()
            .get(query_hash)
            .filter(|entry| !entry.is_expired(now))
            .cloned())
    }

    async fn put_if_absent(&self, entry: &QueryCacheEntry) -> Result<bool> {
        let mut cache = self.cache.write().unwrap();
        if cache.contains_key(&entry.query_hash) {
            return Ok(false);
        }
        cache.insert(entry.query_hash.clone(), entry.clone());
        Ok(true)
    }
}
