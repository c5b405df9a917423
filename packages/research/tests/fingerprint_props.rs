//! Property tests for the cache fingerprint and claim normalization.

use proptest::prelude::*;

use research::pipeline::similarity;
use research::pipeline::strategy::{normalize_question, query_hash};
use research::SearchStrategy;

proptest! {
    /// Whitespace-only and case-only edits never change the hash.
    #[test]
    fn hash_stable_under_cosmetic_edits(question in "[a-zA-Z0-9 ]{1,60}") {
        let noisy = format!("  {}  ", question.to_uppercase());
        prop_assert_eq!(
            query_hash(&question, SearchStrategy::Verbatim, 5),
            query_hash(&noisy, SearchStrategy::Verbatim, 5)
        );
    }

    /// Terminal punctuation is ignored by the fingerprint.
    #[test]
    fn hash_ignores_terminal_punctuation(question in "[a-z][a-z0-9 ]{1,40}") {
        prop_assert_eq!(
            query_hash(&question, SearchStrategy::Verbatim, 5),
            query_hash(&format!("{question}?"), SearchStrategy::Verbatim, 5)
        );
    }

    /// Normalization is idempotent.
    #[test]
    fn question_normalization_idempotent(question in "[ -~]{0,80}") {
        let once = normalize_question(&question);
        prop_assert_eq!(normalize_question(&once), once.clone());
    }

    /// Claim normalization is idempotent too.
    #[test]
    fn claim_normalization_idempotent(text in "[ -~]{0,80}") {
        let once = similarity::normalize(&text);
        prop_assert_eq!(similarity::normalize(&once), once.clone());
    }

    /// A claim always lands in the same group as itself.
    #[test]
    fn similarity_reflexive(text in "[a-z]{3,12}( [a-z]{3,12}){1,6}") {
        prop_assert!(similarity::same_group(&text, &text, 0.72));
    }
}
