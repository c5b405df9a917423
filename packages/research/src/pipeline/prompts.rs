//! Deterministic prompt templates.
//!
//! Prompts are fixed strings with interpolated inputs only; sampling
//! settings are pinned by the LLM client, so identical inputs produce
//! stable outputs.

use crate::types::claim::VerifiedClaim;

/// System prompt for per-document claim extraction.
pub const EXTRACT_SYSTEM: &str = "\
You extract atomic factual claims from web page text. \
Respond with a JSON array only, no prose. Each element is an object \
with \"text\" (one self-contained factual sentence, no pronouns \
without referents) and \"polarity\" (\"AFFIRM\" if the sentence \
asserts the fact, \"NEGATE\" if it denies it, \"UNSPECIFIED\" \
otherwise). Skip opinions, predictions, and questions.";

/// Build the user prompt for claim extraction from one document.
pub fn extract_user_prompt(question: &str, document_text: &str) -> String {
    format!(
        "Question under research: {question}\n\n\
         Page text:\n{document_text}\n\n\
         Extract every atomic factual claim relevant to the question \
         as a JSON array."
    )
}

/// System prompt for question reframing (strategy rotation).
pub const REFRAME_SYSTEM: &str = "\
You rewrite research questions as alternative web search queries. \
Respond with a single rewritten query on one line, nothing else. \
Preserve the meaning exactly; change only the wording.";

/// Build the user prompt for question reframing.
pub fn reframe_user_prompt(question: &str) -> String {
    format!("Rewrite this question as a different search query: {question}")
}

/// System prompt for grounded answer synthesis.
pub const SYNTHESIZE_SYSTEM: &str = "\
You answer research questions using ONLY the verified claims \
supplied. State nothing that is not entailed by those claims. Do not \
invent URLs, names, or numbers. If the claims cannot answer the \
question, respond exactly: Insufficient verified evidence.";

/// Stricter retry variant used after an integrity-check rejection.
pub const SYNTHESIZE_STRICT_SYSTEM: &str = "\
You answer research questions using ONLY the verified claims \
supplied. Every number, date, and quantity in your answer MUST be \
copied verbatim from the claims; introducing any other numeral is an \
error. Prefer quoting claim wording directly. If the claims cannot \
answer the question, respond exactly: Insufficient verified evidence.";

/// Build the user prompt for synthesis.
///
/// Tentative claims are flagged so the answer can hedge; they are
/// only supplied when nothing verified exists.
pub fn synthesize_user_prompt(question: &str, claims: &[&VerifiedClaim], tentative: bool) -> String {
    let mut prompt = format!("Question: {question}\n\nClaims:\n");
    for claim in claims {
        prompt.push_str("- ");
        prompt.push_str(&claim.canonical_text);
        prompt.push('\n');
    }
    if tentative {
        prompt.push_str(
            "\nThese claims are unverified; present any answer as \
             tentative and say the evidence is weak.\n",
        );
    }
    prompt.push_str("\nAnswer the question from these claims alone.");
    prompt
}
