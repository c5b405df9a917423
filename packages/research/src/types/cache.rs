//! Query cache entries keyed by the question fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answer::{AnswerSnapshot, Evidence};

/// A cached accepted answer, keyed by the query fingerprint.
///
/// Only written when the final verification decision was ACCEPT.
/// Expired entries are never returned by the repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCacheEntry {
    pub query_hash: String,
    pub snapshot: AnswerSnapshot,
    pub evidence: Vec<Evidence>,
    pub expires_at: DateTime<Utc>,
}

impl QueryCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
