//! Session lifecycle types: the state machine vocabulary, per-attempt
//! traces, and search logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::strategy::SearchStrategy;

/// Lifecycle state of a research session.
///
/// Advances monotonically through the planner's state machine.
/// `Done` and `Failed` are terminal and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Init,
    Research,
    Verify,
    Synthesize,
    Done,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Research => "RESEARCH",
            Self::Verify => "VERIFY",
            Self::Synthesize => "SYNTHESIZE",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(Self::Init),
            "RESEARCH" => Some(Self::Research),
            "VERIFY" => Some(Self::Verify),
            "SYNTHESIZE" => Some(Self::Synthesize),
            "DONE" => Some(Self::Done),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Rank in the forward direction of the state machine.
    ///
    /// `Failed` is reachable from anywhere, so it ranks above all
    /// non-terminal states. Used to enforce monotonic advancement.
    fn rank(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Research => 1,
            Self::Verify => 2,
            Self::Synthesize => 3,
            Self::Done => 4,
            Self::Failed => 5,
        }
    }

    /// Whether a transition to `next` is legal.
    ///
    /// Terminal states are never left. The Verify -> Research edge is
    /// the retry loop; everything else must move forward.
    pub fn can_advance_to(&self, next: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == SessionStatus::Failed {
            return true;
        }
        // Retry loop: VERIFY (or a failed RESEARCH) back to RESEARCH.
        if next == SessionStatus::Research && matches!(self, Self::Research | Self::Verify) {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user question and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySession {
    pub session_id: Uuid,
    pub question: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuerySession {
    pub fn new(question: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            question: question.into(),
            status: SessionStatus::Init,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The planner's next-action directive after verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationDecision {
    /// Enough independent verification; synthesize the answer.
    Accept,
    /// Evidence is thin or conflicted and budget remains; rotate and retry.
    Retry,
    /// Further searching is unlikely to improve; synthesize best-effort.
    Stop,
}

impl VerificationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Retry => "RETRY",
            Self::Stop => "STOP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCEPT" => Some(Self::Accept),
            "RETRY" => Some(Self::Retry),
            "STOP" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// One attempt row in the audit trace.
///
/// At most one trace exists per `(session_id, attempt_number)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerTrace {
    pub session_id: Uuid,
    pub attempt_number: u32,
    pub planner_state: SessionStatus,
    pub strategy_used: SearchStrategy,
    pub num_docs: u32,
    pub decision: VerificationDecision,
    pub created_at: DateTime<Utc>,
}

/// One search invocation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLog {
    pub session_id: Uuid,
    pub attempt_number: u32,
    pub query_used: String,
    pub num_docs: u32,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// The full audit trace of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTrace {
    pub planner_traces: Vec<PlannerTrace>,
    pub search_logs: Vec<SearchLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SessionStatus::Init,
            SessionStatus::Research,
            SessionStatus::Verify,
            SessionStatus::Synthesize,
            SessionStatus::Done,
            SessionStatus::Failed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("BOGUS"), None);
    }

    #[test]
    fn test_terminal_states_never_left() {
        for next in [
            SessionStatus::Init,
            SessionStatus::Research,
            SessionStatus::Failed,
        ] {
            assert!(!SessionStatus::Done.can_advance_to(next));
            assert!(!SessionStatus::Failed.can_advance_to(next));
        }
    }

    #[test]
    fn test_retry_loop_is_legal() {
        assert!(SessionStatus::Verify.can_advance_to(SessionStatus::Research));
        assert!(SessionStatus::Research.can_advance_to(SessionStatus::Research));
        assert!(!SessionStatus::Synthesize.can_advance_to(SessionStatus::Research));
    }

    #[test]
    fn test_forward_only() {
        assert!(SessionStatus::Init.can_advance_to(SessionStatus::Research));
        assert!(SessionStatus::Research.can_advance_to(SessionStatus::Verify));
        assert!(SessionStatus::Verify.can_advance_to(SessionStatus::Synthesize));
        assert!(SessionStatus::Synthesize.can_advance_to(SessionStatus::Done));
        assert!(!SessionStatus::Verify.can_advance_to(SessionStatus::Init));
    }
}
