//! The planner: a budgeted, cacheable, retrying state machine.
//!
//! Drives one session from INIT to DONE or FAILED. Each attempt is a
//! RESEARCH/VERIFY loop; the planner enforces the attempt, search,
//! and wall-clock budgets, rotates strategies on retry, arbitrates
//! the query cache, and writes one trace row per attempt. The
//! verification engine recommends; the planner decides.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ResearchError, Result};
use crate::pipeline::agent::{AttemptOutcome, ResearchAgent};
use crate::pipeline::extractor::ClaimExtractor;
use crate::pipeline::strategy::{self, SearchStrategy};
use crate::pipeline::synthesize::AnswerSynthesizer;
use crate::pipeline::verify::{VerificationEngine, VerifyContext};
use crate::traits::clock::Clock;
use crate::traits::fetch::DocumentFetcher;
use crate::traits::llm::LLMClient;
use crate::traits::repository::{
    AnswerRepository, CacheRepository, SessionRepository, TraceRepository,
};
use crate::traits::search::SearchProvider;
use crate::types::answer::{AnswerSnapshot, ConfidenceLevel, Evidence, ABSTENTION_TEXT};
use crate::types::cache::QueryCacheEntry;
use crate::types::claim::ClaimStatus;
use crate::types::config::{PlannerConfig, VerifierConfig, WebConfig};
use crate::types::session::{
    PlannerTrace, QuerySession, SessionStatus, VerificationDecision,
};
use crate::web::WebEnvironment;

/// Injected capabilities; tests substitute in-memory fakes.
#[derive(Clone)]
pub struct ResearchContext {
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub llm: Arc<dyn LLMClient>,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<dyn SessionRepository>,
    pub traces: Arc<dyn TraceRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub cache: Arc<dyn CacheRepository>,
}

/// The state machine driver.
pub struct PlannerAgent {
    ctx: ResearchContext,
    agent: ResearchAgent,
    synthesizer: AnswerSynthesizer,
    config: PlannerConfig,
}

impl PlannerAgent {
    pub fn new(ctx: ResearchContext, config: PlannerConfig) -> Self {
        Self::with_configs(ctx, config, WebConfig::default(), VerifierConfig::default())
    }

    pub fn with_configs(
        ctx: ResearchContext,
        config: PlannerConfig,
        web: WebConfig,
        verifier: VerifierConfig,
    ) -> Self {
        let environment = WebEnvironment::new(
            Arc::clone(&ctx.search),
            Arc::clone(&ctx.fetcher),
            Arc::clone(&ctx.traces),
            Arc::clone(&ctx.clock),
            web,
        );
        let extractor = ClaimExtractor::new(Arc::clone(&ctx.llm), &verifier);
        let engine = VerificationEngine::new(verifier);
        let agent = ResearchAgent::new(environment, extractor, engine, Arc::clone(&ctx.llm));
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&ctx.llm));
        Self {
            ctx,
            agent,
            synthesizer,
            config,
        }
    }

    /// Drive one session to a terminal status.
    ///
    /// Safe to invoke exactly once per session: a non-INIT session is
    /// a caller bug and results in a logged noop, never a state
    /// change. On any uncaught error the session ends FAILED with an
    /// abstention result.
    pub async fn run(&self, session_id: Uuid) -> Result<()> {
        let session = self
            .ctx
            .sessions
            .read_session(session_id)
            .await?
            .ok_or(ResearchError::SessionNotFound { session_id })?;

        if session.status != SessionStatus::Init {
            warn!(
                session_id = %session_id,
                status = %session.status,
                "run() called on a non-INIT session; ignoring"
            );
            return Ok(());
        }

        let cancel = CancellationToken::new();
        match self.drive(&session, &cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(session_id = %session_id, error = %e, "session failed");
                cancel.cancel();
                self.finalize_failed(&session, &format!("Session failed: {e}"))
                    .await;
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &QuerySession, cancel: &CancellationToken) -> Result<()> {
        let session_id = session.session_id;
        let deadline = self.ctx.clock.now()
            + ChronoDuration::from_std(self.config.session_timeout)
                .unwrap_or_else(|_| ChronoDuration::seconds(90));

        let mut searches_used: u32 = 0;
        let mut prior_conflict = false;
        let mut last_outcome: Option<AttemptOutcome> = None;

        for attempt in 1..=self.config.max_attempts {
            if self.ctx.clock.now() >= deadline {
                return Err(ResearchError::DeadlineExceeded);
            }

            self.ctx
                .sessions
                .update_status(session_id, SessionStatus::Research)
                .await?;

            let strategy = SearchStrategy::for_attempt(attempt);
            let num_docs = self.config.docs_for_attempt(attempt);

            // Cache probe on retries only; the first attempt always
            // does real research.
            if attempt >= 2 {
                let hash = strategy::query_hash(&session.question, strategy, num_docs);
                if let Some(entry) = self.ctx.cache.get(&hash, self.ctx.clock.now()).await? {
                    info!(session_id = %session_id, attempt, "cache hit, skipping research");
                    return self
                        .complete_from_cache(session, attempt, strategy, num_docs, entry)
                        .await;
                }
            }

            if searches_used >= self.config.max_searches {
                // Search budget gone without a decision; synthesize
                // from whatever the last attempt produced.
                break;
            }
            searches_used += 1;

            let verify_ctx = VerifyContext {
                attempt,
                max_attempts: self.config.max_attempts,
                prior_conflict,
            };

            let outcome = match self
                .agent
                .attempt(
                    session_id,
                    &session.question,
                    attempt,
                    strategy,
                    num_docs,
                    verify_ctx,
                    cancel,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_transient() => {
                    warn!(
                        session_id = %session_id,
                        attempt,
                        error = %e,
                        "attempt hit a transient failure"
                    );
                    self.append_trace(
                        session_id,
                        attempt,
                        SessionStatus::Research,
                        strategy,
                        0,
                        VerificationDecision::Retry,
                    )
                    .await?;
                    if attempt == self.config.max_attempts {
                        return Err(e);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            prior_conflict = outcome.conflict_present;

            if outcome.documents.is_empty() {
                self.append_trace(
                    session_id,
                    attempt,
                    SessionStatus::Research,
                    strategy,
                    0,
                    VerificationDecision::Retry,
                )
                .await?;
                let budget_remains =
                    attempt < self.config.max_attempts && searches_used < self.config.max_searches;
                if budget_remains {
                    info!(session_id = %session_id, attempt, "no usable documents, rotating strategy");
                    continue;
                }
                self.finalize_failed(session, "No usable documents found within budget.")
                    .await;
                return Ok(());
            }

            self.ctx
                .sessions
                .update_status(session_id, SessionStatus::Verify)
                .await?;

            let decision = outcome.decision;
            self.append_trace(
                session_id,
                attempt,
                SessionStatus::Verify,
                strategy,
                outcome.documents.len() as u32,
                decision,
            )
            .await?;

            match decision {
                VerificationDecision::Accept => {
                    return self
                        .synthesize_and_finish(
                            session,
                            &outcome,
                            Some((strategy, num_docs)),
                        )
                        .await;
                }
                VerificationDecision::Retry => {
                    let budget_remains = attempt < self.config.max_attempts
                        && searches_used < self.config.max_searches
                        && self.ctx.clock.now() < deadline;
                    if budget_remains {
                        info!(session_id = %session_id, attempt, "verification requested retry");
                        last_outcome = Some(outcome);
                        continue;
                    }
                    // Out of budget: best-effort synthesis.
                    return self.synthesize_and_finish(session, &outcome, None).await;
                }
                VerificationDecision::Stop => {
                    return self.synthesize_and_finish(session, &outcome, None).await;
                }
            }
        }

        // Attempts (or searches) exhausted while every decision said
        // retry; fall back to the evidence of the last real attempt.
        match last_outcome {
            Some(outcome) => self.synthesize_and_finish(session, &outcome, None).await,
            None => {
                self.finalize_failed(session, "Search budget exhausted before any attempt completed.")
                    .await;
                Ok(())
            }
        }
    }

    /// SYNTHESIZE and DONE, writing snapshot + evidence atomically.
    ///
    /// `accepted` carries the accepting attempt's cache key parts;
    /// `None` means best-effort synthesis (the decision was not
    /// ACCEPT, so nothing is cached and confidence falls back to LOW
    /// when nothing is verified).
    async fn synthesize_and_finish(
        &self,
        session: &QuerySession,
        outcome: &AttemptOutcome,
        accepted: Option<(SearchStrategy, u32)>,
    ) -> Result<()> {
        let session_id = session.session_id;
        self.ctx
            .sessions
            .update_status(session_id, SessionStatus::Synthesize)
            .await?;

        let answer_text = self
            .synthesizer
            .synthesize(&session.question, &outcome.verified_claims)
            .await?;

        let has_verified = outcome
            .verified_claims
            .iter()
            .any(|c| c.status == ClaimStatus::Verified);
        let (confidence_level, confidence_reason) = if accepted.is_none() && !has_verified {
            (ConfidenceLevel::Low, outcome.confidence_reason.clone())
        } else {
            (outcome.confidence, outcome.confidence_reason.clone())
        };

        let snapshot = AnswerSnapshot {
            session_id,
            answer_text,
            confidence_level,
            confidence_reason,
            created_at: self.ctx.clock.now(),
        };
        let evidence = Evidence::from_claims(session_id, &outcome.verified_claims);
        self.ctx.answers.write_answer(&snapshot, &evidence).await?;

        self.ctx
            .sessions
            .update_status(session_id, SessionStatus::Done)
            .await?;
        info!(
            session_id = %session_id,
            confidence = snapshot.confidence_level.as_str(),
            "session complete"
        );

        // Cache only accepted answers; first writer wins.
        if let Some((strategy, num_docs)) = accepted {
            let entry = QueryCacheEntry {
                query_hash: strategy::query_hash(&session.question, strategy, num_docs),
                snapshot,
                evidence,
                expires_at: self.ctx.clock.now()
                    + ChronoDuration::from_std(self.config.cache_ttl)
                        .unwrap_or_else(|_| ChronoDuration::seconds(3600)),
            };
            if !self.ctx.cache.put_if_absent(&entry).await? {
                info!(session_id = %session_id, "cache entry already present, keeping first writer");
            }
        }

        Ok(())
    }

    /// Serve a cached answer: trace the attempt, copy the snapshot
    /// and evidence onto this session, and finish.
    async fn complete_from_cache(
        &self,
        session: &QuerySession,
        attempt: u32,
        strategy: SearchStrategy,
        num_docs: u32,
        entry: QueryCacheEntry,
    ) -> Result<()> {
        let session_id = session.session_id;
        self.append_trace(
            session_id,
            attempt,
            SessionStatus::Synthesize,
            strategy,
            num_docs,
            VerificationDecision::Accept,
        )
        .await?;

        self.ctx
            .sessions
            .update_status(session_id, SessionStatus::Synthesize)
            .await?;

        let snapshot = AnswerSnapshot {
            session_id,
            answer_text: entry.snapshot.answer_text.clone(),
            confidence_level: entry.snapshot.confidence_level,
            confidence_reason: entry.snapshot.confidence_reason.clone(),
            created_at: self.ctx.clock.now(),
        };
        let evidence: Vec<Evidence> = entry
            .evidence
            .iter()
            .map(|e| Evidence {
                session_id,
                claim: e.claim.clone(),
            })
            .collect();
        self.ctx.answers.write_answer(&snapshot, &evidence).await?;

        self.ctx
            .sessions
            .update_status(session_id, SessionStatus::Done)
            .await?;
        Ok(())
    }

    /// Terminal failure: best-effort abstention snapshot, then FAILED.
    ///
    /// Failures here are logged and swallowed; the FAILED transition
    /// must not be blocked by a secondary write error.
    async fn finalize_failed(&self, session: &QuerySession, reason: &str) {
        let session_id = session.session_id;

        let snapshot = AnswerSnapshot {
            session_id,
            answer_text: ABSTENTION_TEXT.to_string(),
            confidence_level: ConfidenceLevel::Low,
            confidence_reason: reason.to_string(),
            created_at: self.ctx.clock.now(),
        };
        if let Err(e) = self.ctx.answers.write_answer(&snapshot, &[]).await {
            warn!(session_id = %session_id, error = %e, "could not persist failure snapshot");
        }

        if let Err(e) = self
            .ctx
            .sessions
            .update_status(session_id, SessionStatus::Failed)
            .await
        {
            error!(session_id = %session_id, error = %e, "could not mark session FAILED");
        }
    }

    async fn append_trace(
        &self,
        session_id: Uuid,
        attempt: u32,
        planner_state: SessionStatus,
        strategy: SearchStrategy,
        num_docs: u32,
        decision: VerificationDecision,
    ) -> Result<()> {
        self.ctx
            .traces
            .append_planner_trace(&PlannerTrace {
                session_id,
                attempt_number: attempt,
                planner_state,
                strategy_used: strategy,
                num_docs,
                decision,
                created_at: self.ctx.clock.now(),
            })
            .await
    }
}
