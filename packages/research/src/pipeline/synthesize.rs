//! Grounded answer synthesis with a numeric integrity post-check.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::pipeline::{prompts, similarity};
use crate::traits::llm::{CompletionRequest, LLMClient};
use crate::types::answer::ABSTENTION_TEXT;
use crate::types::claim::{ClaimStatus, VerifiedClaim};

/// Synthesizes prose strictly constrained to the supplied claims.
///
/// The model is told to state nothing not entailed by the claims and
/// to abstain when they cannot answer the question. A post-check
/// rejects answers that introduce numerals absent from every input;
/// one stricter retry runs, and if that also fails the verified
/// claims are concatenated verbatim.
pub struct AnswerSynthesizer {
    llm: Arc<dyn LLMClient>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// Produce the answer text for a question from verified claims.
    ///
    /// Unverified claims are used only when nothing is verified, and
    /// the prompt flags them as tentative. An empty claim list
    /// short-circuits to the abstention message.
    pub async fn synthesize(&self, question: &str, claims: &[VerifiedClaim]) -> Result<String> {
        let verified: Vec<&VerifiedClaim> = claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Verified)
            .collect();
        let (selected, tentative) = if verified.is_empty() {
            let unverified: Vec<&VerifiedClaim> = claims
                .iter()
                .filter(|c| c.status == ClaimStatus::Unverified)
                .collect();
            (unverified, true)
        } else {
            (verified, false)
        };

        if selected.is_empty() {
            return Ok(ABSTENTION_TEXT.to_string());
        }

        let allowed = allowed_numerals(question, &selected);
        let user = prompts::synthesize_user_prompt(question, &selected, tentative);

        let first = self
            .llm
            .complete(&CompletionRequest::new(prompts::SYNTHESIZE_SYSTEM, &user))
            .await?;
        if passes_integrity(&first, &allowed) {
            return Ok(first.trim().to_string());
        }
        warn!("synthesized answer introduced ungrounded numerals, retrying strict");

        let second = self
            .llm
            .complete(&CompletionRequest::new(
                prompts::SYNTHESIZE_STRICT_SYSTEM,
                &user,
            ))
            .await?;
        if passes_integrity(&second, &allowed) {
            return Ok(second.trim().to_string());
        }
        warn!("strict synthesis also failed integrity check, falling back to claims");

        Ok(selected
            .iter()
            .map(|c| c.canonical_text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Numerals an answer is allowed to contain: everything appearing in
/// the claims or in the question itself.
fn allowed_numerals(question: &str, claims: &[&VerifiedClaim]) -> HashSet<String> {
    let mut allowed: HashSet<String> =
        similarity::numeric_tokens(&similarity::normalize(question))
            .into_iter()
            .collect();
    for claim in claims {
        allowed.extend(similarity::numeric_tokens(&similarity::normalize(
            &claim.canonical_text,
        )));
    }
    allowed
}

/// An answer passes when every numeral it contains is allowed.
fn passes_integrity(answer: &str, allowed: &HashSet<String>) -> bool {
    similarity::numeric_tokens(&similarity::normalize(answer))
        .iter()
        .all(|token| allowed.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(text: &str, status: ClaimStatus) -> VerifiedClaim {
        VerifiedClaim {
            canonical_text: text.to_string(),
            status,
            supporting_urls: vec!["https://nasa.gov/a".to_string()],
            opposing_urls: vec![],
            distinct_domains: 2,
        }
    }

    #[test]
    fn test_integrity_accepts_grounded_numbers() {
        let c = claim("Voyager 1 was launched in 1977.", ClaimStatus::Verified);
        let allowed = allowed_numerals("When did Voyager 1 launch?", &[&c]);
        assert!(passes_integrity("Voyager 1 was launched in 1977.", &allowed));
    }

    #[test]
    fn test_integrity_rejects_invented_numbers() {
        let c = claim("Voyager 1 was launched in 1977.", ClaimStatus::Verified);
        let allowed = allowed_numerals("When did Voyager 1 launch?", &[&c]);
        assert!(!passes_integrity(
            "Voyager 1 was launched in 1977 and cost 250 million dollars.",
            &allowed
        ));
    }

    #[test]
    fn test_question_numerals_are_allowed() {
        let c = claim("The probe left Earth decades ago.", ClaimStatus::Verified);
        let allowed = allowed_numerals("When did Voyager 1 launch?", &[&c]);
        assert!(passes_integrity("Voyager 1 left Earth decades ago.", &allowed));
    }
}
