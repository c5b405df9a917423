//! Per-document claim extraction via one deterministic LLM call.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::prompts;
use crate::traits::llm::{CompletionRequest, LLMClient};
use crate::types::claim::{Claim, Polarity};
use crate::types::config::VerifierConfig;
use crate::types::document::Document;

/// Hedging markers that flag speculation rather than fact.
const HEDGING_MARKERS: &[&str] = &[
    "might", "may", "could", "possibly", "perhaps", "reportedly", "allegedly", "rumored",
    "unclear", "likely", "probably", "seems", "appears",
];

/// Extracts atomic claims from one document at a time.
///
/// Idempotent with respect to identical document text: the prompt is
/// fixed and the client pins deterministic sampling settings.
pub struct ClaimExtractor {
    llm: Arc<dyn LLMClient>,
    min_claim_chars: usize,
    max_hedging_markers: usize,
}

impl ClaimExtractor {
    pub fn new(llm: Arc<dyn LLMClient>, config: &VerifierConfig) -> Self {
        Self {
            llm,
            min_claim_chars: config.min_claim_chars,
            max_hedging_markers: config.max_hedging_markers,
        }
    }

    /// Extract claims from one document.
    ///
    /// Unparseable LLM output yields an empty list, not an error; a
    /// document with nothing factual in it is a data-quality signal
    /// the verifier handles, not a failure.
    pub async fn extract(&self, question: &str, document: &Document) -> Result<Vec<Claim>> {
        let request = CompletionRequest::new(
            prompts::EXTRACT_SYSTEM,
            prompts::extract_user_prompt(question, &document.text),
        )
        .with_max_tokens(2048);

        let response = self.llm.complete(&request).await?;
        let raw = parse_claim_array(&response);

        let claims: Vec<Claim> = raw
            .into_iter()
            .filter_map(|(text, polarity)| {
                let text = text.trim().to_string();
                if text.len() < self.min_claim_chars {
                    debug!(url = %document.url, "claim too short, dropped");
                    return None;
                }
                if hedging_count(&text) > self.max_hedging_markers {
                    debug!(url = %document.url, claim = %text, "hedged claim dropped");
                    return None;
                }
                Some(Claim {
                    text,
                    polarity,
                    source_url: document.url.clone(),
                    source_domain: document.domain.clone(),
                })
            })
            .collect();

        if claims.is_empty() {
            warn!(url = %document.url, "no usable claims extracted");
        }
        Ok(claims)
    }
}

/// Count hedging markers in a claim, word-bounded.
fn hedging_count(text: &str) -> usize {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| HEDGING_MARKERS.contains(w))
        .count()
}

/// Pull `(text, polarity)` pairs out of the model's JSON response.
///
/// Tolerates prose around the array: the parse starts at the first
/// `[` and ends at the last `]`. Anything unparseable yields an
/// empty list.
fn parse_claim_array(response: &str) -> Vec<(String, Polarity)> {
    let start = match response.find('[') {
        Some(i) => i,
        None => return Vec::new(),
    };
    let end = match response.rfind(']') {
        Some(i) if i > start => i,
        _ => return Vec::new(),
    };

    #[derive(serde::Deserialize)]
    struct RawClaim {
        text: String,
        #[serde(default)]
        polarity: Option<String>,
    }

    match serde_json::from_str::<Vec<RawClaim>>(&response[start..=end]) {
        Ok(raw) => raw
            .into_iter()
            .map(|c| {
                let polarity = c
                    .polarity
                    .as_deref()
                    .and_then(Polarity::parse)
                    .unwrap_or(Polarity::Unspecified);
                (c.text, polarity)
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "claim array parse failed");
            Vec::new()
        }
    }
}
