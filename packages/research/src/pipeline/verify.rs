//! Cross-source claim verification.
//!
//! Groups semantically-equivalent claims, reconciles polarity and
//! stated-value disagreements, labels each group, and recommends the
//! planner's next action. The planner remains the authority on budget.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::pipeline::similarity;
use crate::types::claim::{Claim, ClaimStatus, Polarity, VerifiedClaim};
use crate::types::config::VerifierConfig;
use crate::types::session::VerificationDecision;

/// Budget context the planner passes in; the engine never counts
/// attempts itself.
#[derive(Debug, Clone, Copy)]
pub struct VerifyContext {
    pub attempt: u32,
    pub max_attempts: u32,
    /// Whether the previous attempt also surfaced a conflict group.
    /// A conflict that survives a strategy rotation is stable; more
    /// searching will not resolve it.
    pub prior_conflict: bool,
}

/// Output of one verification pass.
#[derive(Debug, Clone)]
pub struct Verification {
    /// One resolution per claim group, first-appearance order.
    pub claims: Vec<VerifiedClaim>,
    pub decision: VerificationDecision,
    pub conflict_present: bool,
}

/// Groups, labels, and decides.
pub struct VerificationEngine {
    config: VerifierConfig,
}

impl VerificationEngine {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn verify(&self, claims: &[Claim], ctx: &VerifyContext) -> Verification {
        let groups = self.group(claims);
        let resolved: Vec<VerifiedClaim> = groups
            .iter()
            .map(|group| self.resolve_group(claims, group))
            .collect();

        let decision = self.decide(claims, &resolved, ctx);
        let conflict_present = resolved.iter().any(|c| c.status == ClaimStatus::Conflict);

        debug!(
            groups = resolved.len(),
            verified = resolved.iter().filter(|c| c.status == ClaimStatus::Verified).count(),
            conflicts = resolved.iter().filter(|c| c.status == ClaimStatus::Conflict).count(),
            decision = decision.as_str(),
            "verification pass complete"
        );

        Verification {
            claims: resolved,
            decision,
            conflict_present,
        }
    }

    /// Transitive closure of the similarity predicate, via union-find.
    fn group(&self, claims: &[Claim]) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..claims.len()).collect();

        fn find(parent: &mut Vec<usize>, i: usize) -> usize {
            if parent[i] != i {
                let root = find(parent, parent[i]);
                parent[i] = root;
            }
            parent[i]
        }

        for i in 0..claims.len() {
            for j in (i + 1)..claims.len() {
                if similarity::same_group(
                    &claims[i].text,
                    &claims[j].text,
                    self.config.similarity_threshold,
                ) {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        parent[rj] = ri;
                    }
                }
            }
        }

        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        for i in 0..claims.len() {
            let root = find(&mut parent, i);
            let members = by_root.entry(root).or_insert_with(|| {
                order.push(root);
                Vec::new()
            });
            members.push(i);
        }
        order.into_iter().map(|root| by_root.remove(&root).unwrap()).collect()
    }

    /// Label one group and pick its canonical text.
    fn resolve_group(&self, claims: &[Claim], members: &[usize]) -> VerifiedClaim {
        let group: Vec<&Claim> = members.iter().map(|&i| &claims[i]).collect();

        let affirms = group.iter().filter(|c| c.polarity == Polarity::Affirm).count();
        let negates = group.iter().filter(|c| c.polarity == Polarity::Negate).count();
        let polarity_conflict = affirms > 0 && negates > 0;

        // Value disagreement: same statement shape, different numbers.
        // Partition by numeric signature; the majority signature is the
        // supported reading, the rest oppose it.
        let signatures: Vec<String> = group
            .iter()
            .map(|c| {
                let mut tokens = similarity::numeric_tokens(&similarity::normalize(&c.text));
                tokens.sort();
                tokens.join(" ")
            })
            .collect();
        let mut signature_counts: HashMap<&str, usize> = HashMap::new();
        for sig in signatures.iter().filter(|s| !s.is_empty()) {
            *signature_counts.entry(sig).or_insert(0) += 1;
        }
        let value_conflict = signature_counts.len() > 1;
        let majority_signature = signature_counts
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(&sig, _)| sig.to_string())
            .unwrap_or_default();

        // Dominant explicit polarity; UNSPECIFIED claims back it.
        let dominant = if negates > affirms {
            Polarity::Negate
        } else {
            Polarity::Affirm
        };

        let mut supporting_urls = Vec::new();
        let mut opposing_urls = Vec::new();
        for (claim, signature) in group.iter().zip(signatures.iter()) {
            let opposes_polarity = polarity_conflict
                && claim.polarity != dominant
                && claim.polarity != Polarity::Unspecified;
            let opposes_value =
                value_conflict && !signature.is_empty() && *signature != majority_signature;
            if opposes_polarity || opposes_value {
                if !opposing_urls.contains(&claim.source_url) {
                    opposing_urls.push(claim.source_url.clone());
                }
            } else if !supporting_urls.contains(&claim.source_url) {
                supporting_urls.push(claim.source_url.clone());
            }
        }

        let supporting_domains: HashSet<&str> = group
            .iter()
            .filter(|c| supporting_urls.contains(&c.source_url))
            .map(|c| c.source_domain.as_str())
            .collect();
        let distinct_domains = supporting_domains.len();

        let status = if polarity_conflict || value_conflict {
            ClaimStatus::Conflict
        } else if distinct_domains >= 2 {
            ClaimStatus::Verified
        } else {
            ClaimStatus::Unverified
        };

        VerifiedClaim {
            canonical_text: canonical_text(&group),
            status,
            supporting_urls,
            opposing_urls,
            distinct_domains,
        }
    }

    fn decide(
        &self,
        claims: &[Claim],
        resolved: &[VerifiedClaim],
        ctx: &VerifyContext,
    ) -> VerificationDecision {
        let verified: Vec<&VerifiedClaim> = resolved
            .iter()
            .filter(|c| c.status == ClaimStatus::Verified)
            .collect();
        let conflicts = resolved
            .iter()
            .filter(|c| c.status == ClaimStatus::Conflict)
            .count();
        let total_groups = resolved.len();
        let all_domains: HashSet<&str> = claims.iter().map(|c| c.source_domain.as_str()).collect();

        let accept = conflicts == 0
            && if total_groups < 2 {
                verified
                    .iter()
                    .any(|c| c.distinct_domains >= self.config.lone_group_domains)
            } else {
                verified.len() >= self.config.min_verified
            };
        if accept {
            return VerificationDecision::Accept;
        }

        // A conflict that persisted across a strategy rotation is a
        // stable disagreement; searching again will not resolve it.
        if conflicts > 0 && ctx.prior_conflict {
            return VerificationDecision::Stop;
        }

        let attempts_remain = ctx.attempt < ctx.max_attempts;
        let retry_worthwhile = conflicts > 0 || all_domains.len() < 3;
        if verified.is_empty() && retry_worthwhile && attempts_remain {
            return VerificationDecision::Retry;
        }

        VerificationDecision::Stop
    }
}

/// The most-repeated normalized form wins; ties go to first seen.
fn canonical_text(group: &[&Claim]) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for claim in group {
        *counts.entry(similarity::normalize(&claim.text)).or_insert(0) += 1;
    }
    group
        .iter()
        .max_by_key(|c| counts[&similarity::normalize(&c.text)])
        .map(|c| c.text.clone())
        .unwrap_or_default()
}
