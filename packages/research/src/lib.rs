//! # Research Library
//!
//! A budgeted, cacheable, retrying research engine: given a natural
//! language question, it searches the open web, extracts atomic
//! claims, cross-verifies them across sources, scores confidence,
//! and synthesizes a grounded answer, persisting every decision for
//! audit.
//!
//! ## Design Philosophy
//!
//! | Principle | Description |
//! |-----------|-------------|
//! | **Capability-injected** | Search, fetch, LLM, clock, and storage are traits; tests use fakes |
//! | **Evidence-grounded** | Answers state only what verified claims entail |
//! | **Budgeted** | Attempts, searches, and wall-clock are hard caps |
//! | **Auditable** | Every attempt writes a trace row before the next begins |
//!
//! ## Architecture
//!
//! ```text
//! Question → PlannerAgent → (cache probe) → ResearchAgent
//!     → WebEnvironment → ClaimExtractor → VerificationEngine
//!     → ConfidenceScorer → AnswerSynthesizer
//!     → AnswerSnapshot + Evidence persisted
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use research::{MemoryStore, PlannerAgent, PlannerConfig, ResearchContext, ValidatedFetcher};
//! use research::security::{LlmCredentials, SearchCredentials};
//! use research::traits::clock::SystemClock;
//! use research::traits::fetch::HttpFetcher;
//! use research::traits::llm::ChatCompletionsClient;
//! use research::traits::search::{CustomSearchProvider, RateLimitedSearchProvider};
//!
//! let store = Arc::new(MemoryStore::new());
//! let ctx = ResearchContext {
//!     search: Arc::new(RateLimitedSearchProvider::new(CustomSearchProvider::new(
//!         SearchCredentials::new(api_key, engine_id),
//!     ))),
//!     fetcher: Arc::new(ValidatedFetcher::new(HttpFetcher::default())),
//!     llm: Arc::new(ChatCompletionsClient::new(LlmCredentials::new(llm_key, "gpt-4o"))),
//!     clock: Arc::new(SystemClock),
//!     sessions: store.clone(),
//!     traces: store.clone(),
//!     answers: store.clone(),
//!     cache: store,
//! };
//!
//! let planner = PlannerAgent::new(ctx, PlannerConfig::default());
//! planner.run(session_id).await?;
//! ```
//!
//! ## Modules
//!
//! - [`traits`] - Capability abstractions (search, fetch, LLM, clock, repositories)
//! - [`types`] - Domain types (sessions, documents, claims, answers, budgets)
//! - [`web`] - Search + fetch + extract environment with the domain blocklist
//! - [`pipeline`] - Extraction, verification, scoring, synthesis, and the planner
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Scripted mocks for tests

pub mod error;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod web;

// Re-export core types at crate root
pub use error::{ResearchError, Result, SearchError, SecurityError};
pub use pipeline::strategy::{query_hash, SearchStrategy};
pub use security::{LlmCredentials, SearchCredentials, SecretString};
pub use pipeline::{AttemptOutcome, PlannerAgent, ResearchAgent, ResearchContext};
pub use types::{
    answer::{AnswerSnapshot, ConfidenceLevel, Evidence, SessionResult, ABSTENTION_TEXT},
    cache::QueryCacheEntry,
    claim::{Claim, ClaimStatus, Polarity, VerifiedClaim},
    config::{PlannerConfig, VerifierConfig, WebConfig},
    document::Document,
    session::{
        PlannerTrace, QuerySession, SearchLog, SessionStatus, SessionTrace, VerificationDecision,
    },
};
pub use web::{UrlValidator, ValidatedFetcher, WebEnvironment};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

// Re-export testing utilities
pub use testing::{page_html, ScriptedLLM, TestScenario};
