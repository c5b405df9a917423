//! Final answer output and persisted evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::claim::VerifiedClaim;

/// The answer text served when no grounded answer can be given.
pub const ABSTENTION_TEXT: &str = "Insufficient verified evidence.";

/// Aggregate confidence in the synthesized answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// The final output of a session. At most one per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSnapshot {
    pub session_id: Uuid,
    pub answer_text: String,
    pub confidence_level: ConfidenceLevel,
    pub confidence_reason: String,
    pub created_at: DateTime<Utc>,
}

/// A verified claim persisted against a session, bulk-written in the
/// same transaction as the answer snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub session_id: Uuid,
    pub claim: VerifiedClaim,
}

impl Evidence {
    pub fn from_claims(session_id: Uuid, claims: &[VerifiedClaim]) -> Vec<Self> {
        claims
            .iter()
            .map(|claim| Self {
                session_id,
                claim: claim.clone(),
            })
            .collect()
    }
}

/// What `read_result` serves: snapshot plus its evidence set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub snapshot: AnswerSnapshot,
    pub evidence: Vec<Evidence>,
}
