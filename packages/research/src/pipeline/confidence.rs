//! Rule-based confidence scoring.
//!
//! A pure function of the verified-claim list: no LLM, no clock, no
//! I/O. The reason string is templated so identical inputs always
//! produce identical output.

use std::collections::HashSet;

use crate::types::answer::ConfidenceLevel;
use crate::types::claim::{ClaimStatus, VerifiedClaim};

/// Score the attempt's verified claims.
pub fn score(claims: &[VerifiedClaim]) -> (ConfidenceLevel, String) {
    let verified: Vec<&VerifiedClaim> = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Verified)
        .collect();
    let unverified = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Unverified)
        .count();
    let conflicts = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Conflict)
        .count();

    // Distinct registered domains across all supporting sources of
    // verified groups.
    let supporting_domains: HashSet<String> = verified
        .iter()
        .flat_map(|c| c.supporting_urls.iter())
        .filter_map(|u| url::Url::parse(u).ok())
        .filter_map(|u| {
            u.host_str()
                .map(crate::types::document::registered_domain)
        })
        .collect();
    let domain_count = supporting_domains.len();

    if conflicts > 0 {
        return (
            ConfidenceLevel::Low,
            format!(
                "{} conflicting claim group(s) found among {} total; sources disagree.",
                conflicts,
                claims.len()
            ),
        );
    }

    if verified.len() >= 2 && domain_count >= 3 {
        return (
            ConfidenceLevel::High,
            format!(
                "{} verified claim group(s) supported by {} distinct domains with no conflicts.",
                verified.len(),
                domain_count
            ),
        );
    }

    if !verified.is_empty() {
        return (
            ConfidenceLevel::Medium,
            format!(
                "{} verified claim group(s) from {} distinct domain(s); {} unverified claim(s) provide context only.",
                verified.len(),
                domain_count,
                unverified
            ),
        );
    }

    (
        ConfidenceLevel::Low,
        format!(
            "No claims were verified across independent domains ({} unverified).",
            unverified
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(urls: &[&str]) -> VerifiedClaim {
        VerifiedClaim {
            canonical_text: "claim text long enough".to_string(),
            status: ClaimStatus::Verified,
            supporting_urls: urls.iter().map(|s| s.to_string()).collect(),
            opposing_urls: vec![],
            distinct_domains: urls.len(),
        }
    }

    fn with_status(status: ClaimStatus) -> VerifiedClaim {
        VerifiedClaim {
            canonical_text: "claim text long enough".to_string(),
            status,
            supporting_urls: vec!["https://one.org/a".to_string()],
            opposing_urls: vec![],
            distinct_domains: 1,
        }
    }

    #[test]
    fn test_high_confidence() {
        let claims = vec![
            verified(&["https://nasa.gov/a", "https://britannica.com/b"]),
            verified(&["https://nasa.gov/c", "https://space.com/d"]),
        ];
        let (level, reason) = score(&claims);
        assert_eq!(level, ConfidenceLevel::High);
        assert!(reason.contains("2 verified"));
        assert!(reason.contains("3 distinct domains"));
    }

    #[test]
    fn test_medium_confidence_few_domains() {
        let claims = vec![
            verified(&["https://nasa.gov/a", "https://britannica.com/b"]),
            with_status(ClaimStatus::Unverified),
        ];
        let (level, _) = score(&claims);
        assert_eq!(level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_conflict_forces_low() {
        let claims = vec![
            verified(&["https://nasa.gov/a", "https://britannica.com/b", "https://space.com/c"]),
            verified(&["https://nasa.gov/d", "https://space.com/e"]),
            with_status(ClaimStatus::Conflict),
        ];
        let (level, reason) = score(&claims);
        assert_eq!(level, ConfidenceLevel::Low);
        assert!(reason.contains("disagree"));
    }

    #[test]
    fn test_nothing_verified_is_low() {
        let claims = vec![with_status(ClaimStatus::Unverified)];
        let (level, _) = score(&claims);
        assert_eq!(level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_pure_function() {
        let claims = vec![verified(&["https://nasa.gov/a", "https://britannica.com/b"])];
        assert_eq!(score(&claims), score(&claims));
    }
}
