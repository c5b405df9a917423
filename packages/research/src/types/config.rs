//! Budget and threshold configuration for the planner and its stages.

use std::time::Duration;

/// Budgets enforced by the planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Hard cap on RESEARCH/VERIFY loops per session.
    pub max_attempts: u32,

    /// Hard cap on total search provider calls per session,
    /// failed searches included.
    pub max_searches: u32,

    /// Documents requested on the first attempt.
    pub base_docs: u32,

    /// Additional documents per retry.
    pub docs_step: u32,

    /// Ceiling on the per-attempt document request.
    pub max_docs: u32,

    /// Total wall-clock budget for one session.
    pub session_timeout: Duration,

    /// Lifetime of cache entries written after an ACCEPT.
    pub cache_ttl: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_searches: 4,
            base_docs: 5,
            docs_step: 3,
            max_docs: 15,
            session_timeout: Duration::from_secs(90),
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl PlannerConfig {
    /// Documents to request for attempt `n` (1-based):
    /// `base_docs + (n-1) * docs_step`, capped at `max_docs`.
    pub fn docs_for_attempt(&self, attempt: u32) -> u32 {
        let n = attempt.max(1);
        (self.base_docs + (n - 1) * self.docs_step).min(self.max_docs)
    }
}

/// Thresholds for claim grouping and the verification decision.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Cosine similarity threshold for grouping claims.
    pub similarity_threshold: f32,

    /// Minimum claim length after normalization.
    pub min_claim_chars: usize,

    /// Claims with more hedging markers than this are discarded.
    pub max_hedging_markers: usize,

    /// VERIFIED groups required for an ACCEPT.
    pub min_verified: usize,

    /// Supporting-domain count that lets a single VERIFIED group
    /// carry an ACCEPT when fewer than two groups exist.
    pub lone_group_domains: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.72,
            min_claim_chars: 20,
            max_hedging_markers: 1,
            min_verified: 2,
            lone_group_domains: 3,
        }
    }
}

/// Timeouts and bounds for the web environment.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Per-URL fetch timeout.
    pub fetch_timeout: Duration,

    /// Total wall-clock budget for one attempt's fetches.
    pub fetch_budget: Duration,

    /// Concurrent fetches per attempt.
    pub fetch_concurrency: usize,

    /// Minimum extracted text length for a usable document.
    pub min_document_chars: usize,

    /// Extracted text is truncated to this length.
    pub max_document_chars: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(8),
            fetch_budget: Duration::from_secs(20),
            fetch_concurrency: 8,
            min_document_chars: 200,
            max_document_chars: 20_000,
        }
    }
}
