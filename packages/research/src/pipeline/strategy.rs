//! Search strategy rotation and the query cache fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::pipeline::{prompts, similarity};
use crate::traits::llm::{CompletionRequest, LLMClient};

/// Reputable-domain shortlist for the DOMAIN_RESTRICTED strategy.
const REPUTABLE_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "britannica.com",
    "reuters.com",
    "apnews.com",
    "nature.com",
];

/// A question-mutation policy used to form the search query.
///
/// Rotated in declaration order on each retry; the first attempt is
/// always `Verbatim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStrategy {
    Verbatim,
    KeywordExpansion,
    QuestionReframing,
    DomainRestricted,
}

impl SearchStrategy {
    const ROTATION: [SearchStrategy; 4] = [
        Self::Verbatim,
        Self::KeywordExpansion,
        Self::QuestionReframing,
        Self::DomainRestricted,
    ];

    /// Strategy for a 1-based attempt number; the schedule cycles
    /// past the end of the rotation.
    pub fn for_attempt(attempt: u32) -> Self {
        let index = (attempt.max(1) - 1) as usize % Self::ROTATION.len();
        Self::ROTATION[index]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verbatim => "VERBATIM",
            Self::KeywordExpansion => "KEYWORD_EXPANSION",
            Self::QuestionReframing => "QUESTION_REFRAMING",
            Self::DomainRestricted => "DOMAIN_RESTRICTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VERBATIM" => Some(Self::Verbatim),
            "KEYWORD_EXPANSION" => Some(Self::KeywordExpansion),
            "QUESTION_REFRAMING" => Some(Self::QuestionReframing),
            "DOMAIN_RESTRICTED" => Some(Self::DomainRestricted),
            _ => None,
        }
    }

    /// Mutate the question into this strategy's search query.
    ///
    /// Reframing consults the LLM; on failure it falls back to the
    /// verbatim question rather than failing the attempt.
    pub async fn build_query(&self, question: &str, llm: &Arc<dyn LLMClient>) -> String {
        match self {
            Self::Verbatim => question.to_string(),
            Self::KeywordExpansion => {
                let keywords = distill_keywords(question);
                if keywords.is_empty() {
                    question.to_string()
                } else {
                    format!("{} {}", question, keywords.join(" "))
                }
            }
            Self::QuestionReframing => {
                let request = CompletionRequest::new(
                    prompts::REFRAME_SYSTEM,
                    prompts::reframe_user_prompt(question),
                )
                .with_max_tokens(128);
                match llm.complete(&request).await {
                    Ok(reframed) => {
                        let reframed = reframed.trim();
                        if reframed.is_empty() {
                            question.to_string()
                        } else {
                            reframed.lines().next().unwrap_or(question).to_string()
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "reframing failed, using verbatim query");
                        question.to_string()
                    }
                }
            }
            Self::DomainRestricted => {
                let filters = REPUTABLE_DOMAINS
                    .iter()
                    .map(|d| format!("site:{d}"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("{question} {filters}")
            }
        }
    }
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content keywords of a question: stop words removed, order kept,
/// deduplicated, capped at four.
fn distill_keywords(question: &str) -> Vec<String> {
    let normalized = similarity::normalize(question);
    let mut seen = std::collections::HashSet::new();
    normalized
        .split_whitespace()
        .filter(|w| !similarity::is_stop_word(w) && w.len() > 2)
        .filter(|w| seen.insert(w.to_string()))
        .take(4)
        .map(String::from)
        .collect()
}

/// Normalize a question for fingerprinting: NFC, lowercase,
/// whitespace collapsed, terminal punctuation stripped.
pub fn normalize_question(question: &str) -> String {
    let nfc: String = question.nfc().collect();
    let lowered = nfc.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '?' | '!' | '.' | ';' | ':'))
        .to_string()
}

/// Stable cache fingerprint of `(normalized question, strategy,
/// num_docs)`.
pub fn query_hash(question: &str, strategy: SearchStrategy, num_docs: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_question(question).as_bytes());
    hasher.update([0u8]);
    hasher.update(strategy.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(num_docs.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_order() {
        assert_eq!(SearchStrategy::for_attempt(1), SearchStrategy::Verbatim);
        assert_eq!(
            SearchStrategy::for_attempt(2),
            SearchStrategy::KeywordExpansion
        );
        assert_eq!(
            SearchStrategy::for_attempt(3),
            SearchStrategy::QuestionReframing
        );
        assert_eq!(
            SearchStrategy::for_attempt(4),
            SearchStrategy::DomainRestricted
        );
        // Cycles past the end.
        assert_eq!(SearchStrategy::for_attempt(5), SearchStrategy::Verbatim);
    }

    #[test]
    fn test_hash_stable_under_cosmetic_edits() {
        let a = query_hash("What year was Voyager 1 launched?", SearchStrategy::Verbatim, 5);
        let b = query_hash("  what YEAR was  voyager 1 launched ", SearchStrategy::Verbatim, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_distinguishes_inputs() {
        let base = query_hash("question one", SearchStrategy::Verbatim, 5);
        assert_ne!(base, query_hash("question two", SearchStrategy::Verbatim, 5));
        assert_ne!(
            base,
            query_hash("question one", SearchStrategy::KeywordExpansion, 5)
        );
        assert_ne!(base, query_hash("question one", SearchStrategy::Verbatim, 8));
    }

    #[test]
    fn test_distill_keywords() {
        let keywords = distill_keywords("Who is the current CEO of Acme Corp?");
        assert_eq!(keywords, vec!["current", "ceo", "acme", "corp"]);
    }

    #[tokio::test]
    async fn test_build_query_variants() {
        let llm: Arc<dyn LLMClient> = Arc::new(crate::testing::ScriptedLLM::new());
        let question = "Who is the current CEO of Acme Corp?";

        assert_eq!(
            SearchStrategy::Verbatim.build_query(question, &llm).await,
            question
        );

        let expanded = SearchStrategy::KeywordExpansion
            .build_query(question, &llm)
            .await;
        assert_eq!(
            expanded,
            "Who is the current CEO of Acme Corp? current ceo acme corp"
        );

        let restricted = SearchStrategy::DomainRestricted
            .build_query(question, &llm)
            .await;
        assert!(restricted.starts_with(question));
        assert!(restricted.contains("site:wikipedia.org"));
    }

    #[tokio::test]
    async fn test_reframing_falls_back_on_llm_failure() {
        let llm: Arc<dyn LLMClient> =
            Arc::new(crate::testing::ScriptedLLM::new().fail_when("Rewrite"));
        let question = "Who is the current CEO of Acme Corp?";
        let query = SearchStrategy::QuestionReframing
            .build_query(question, &llm)
            .await;
        assert_eq!(query, question);
    }
}
