//! Atomic claims and their verified resolutions.

use serde::{Deserialize, Serialize};

/// Stance of a claim toward the fact it states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Polarity {
    Affirm,
    Negate,
    Unspecified,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affirm => "AFFIRM",
            Self::Negate => "NEGATE",
            Self::Unspecified => "UNSPECIFIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AFFIRM" => Some(Self::Affirm),
            "NEGATE" => Some(Self::Negate),
            "UNSPECIFIED" => Some(Self::Unspecified),
            _ => None,
        }
    }
}

/// An atomic factual statement extracted from one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Normalized statement text
    pub text: String,
    pub polarity: Polarity,
    pub source_url: String,
    pub source_domain: String,
}

/// Resolution status of a claim group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Independently corroborated across registered domains.
    Verified,
    /// Single source or insufficient domain diversity.
    Unverified,
    /// Sources disagree (polarity or stated values).
    Conflict,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::Unverified => "UNVERIFIED",
            Self::Conflict => "CONFLICT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VERIFIED" => Some(Self::Verified),
            "UNVERIFIED" => Some(Self::Unverified),
            "CONFLICT" => Some(Self::Conflict),
            _ => None,
        }
    }
}

/// The resolution of one claim group after cross-source verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedClaim {
    pub canonical_text: String,
    pub status: ClaimStatus,
    pub supporting_urls: Vec<String>,
    pub opposing_urls: Vec<String>,
    /// Count of distinct registered domains among supporting sources.
    pub distinct_domains: usize,
}

impl VerifiedClaim {
    /// All source URLs, supporting first.
    pub fn source_urls(&self) -> impl Iterator<Item = &str> {
        self.supporting_urls
            .iter()
            .chain(self.opposing_urls.iter())
            .map(String::as_str)
    }
}
