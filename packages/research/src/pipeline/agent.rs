//! One research attempt: gather, extract, verify, score.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::confidence;
use crate::pipeline::extractor::ClaimExtractor;
use crate::pipeline::strategy::SearchStrategy;
use crate::pipeline::verify::{VerificationEngine, VerifyContext};
use crate::traits::llm::LLMClient;
use crate::types::answer::ConfidenceLevel;
use crate::types::claim::VerifiedClaim;
use crate::types::document::Document;
use crate::types::session::VerificationDecision;
use crate::web::WebEnvironment;

/// Everything one attempt produced, handed back to the planner.
///
/// The planner writes the trace; the agent touches no persistence
/// beyond the environment's own search log.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub documents: Vec<Document>,
    pub verified_claims: Vec<VerifiedClaim>,
    pub decision: VerificationDecision,
    pub conflict_present: bool,
    pub confidence: ConfidenceLevel,
    pub confidence_reason: String,
    /// False when the search provider itself failed.
    pub search_succeeded: bool,
}

/// Thin coordinator for a single attempt of the pipeline.
pub struct ResearchAgent {
    environment: WebEnvironment,
    extractor: ClaimExtractor,
    verifier: VerificationEngine,
    llm: Arc<dyn LLMClient>,
}

impl ResearchAgent {
    pub fn new(
        environment: WebEnvironment,
        extractor: ClaimExtractor,
        verifier: VerificationEngine,
        llm: Arc<dyn LLMClient>,
    ) -> Self {
        Self {
            environment,
            extractor,
            verifier,
            llm,
        }
    }

    /// Run one attempt end to end.
    pub async fn attempt(
        &self,
        session_id: Uuid,
        question: &str,
        attempt: u32,
        strategy: SearchStrategy,
        num_docs: u32,
        verify_ctx: VerifyContext,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome> {
        let query = strategy.build_query(question, &self.llm).await;
        info!(session_id = %session_id, attempt, strategy = %strategy, query, "attempt starting");

        let gathered = self
            .environment
            .gather(session_id, attempt, &query, num_docs as usize, cancel)
            .await?;

        if gathered.documents.is_empty() {
            let (confidence, confidence_reason) = confidence::score(&[]);
            return Ok(AttemptOutcome {
                documents: Vec::new(),
                verified_claims: Vec::new(),
                decision: VerificationDecision::Retry,
                conflict_present: false,
                confidence,
                confidence_reason,
                search_succeeded: gathered.success,
            });
        }

        let mut claims = Vec::new();
        for document in &gathered.documents {
            let extracted = self.extractor.extract(question, document).await?;
            debug!(url = %document.url, count = extracted.len(), "claims extracted");
            claims.extend(extracted);
        }

        let verification = self.verifier.verify(&claims, &verify_ctx);
        let (confidence, confidence_reason) = confidence::score(&verification.claims);

        Ok(AttemptOutcome {
            documents: gathered.documents,
            verified_claims: verification.claims,
            decision: verification.decision,
            conflict_present: verification.conflict_present,
            confidence,
            confidence_reason,
            search_succeeded: gathered.success,
        })
    }
}
