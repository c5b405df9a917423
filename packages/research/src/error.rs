//! Typed errors for the research library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur while driving a research session.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Search provider call failed
    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    /// LLM completion service unavailable or failed
    #[error("LLM error: {0}")]
    Llm(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// LLM call exceeded its per-call timeout (retriable)
    #[error("LLM call timed out after {seconds}s")]
    LlmTimeout { seconds: u64 },

    /// Storage operation failed; fatal to the session
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Session not found
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: uuid::Uuid },

    /// Invariant violated by the caller (logged loudly, no state change)
    #[error("invariant violated: {reason}")]
    Invariant { reason: String },

    /// Session exceeded its wall-clock budget
    #[error("session deadline exceeded")]
    DeadlineExceeded,

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid question provided
    #[error("invalid question: {reason}")]
    InvalidQuestion { reason: String },

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ResearchError {
    /// Whether retrying within the attempt budget can help.
    ///
    /// Permanent failures (bad credentials, programmer errors, storage
    /// loss) end the session immediately; transient ones count against
    /// the budget and are retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Search(e) => e.is_transient(),
            Self::LlmTimeout { .. } => true,
            Self::Llm(_) => true,
            Self::Storage(_)
            | Self::SessionNotFound { .. }
            | Self::Invariant { .. }
            | Self::DeadlineExceeded
            | Self::Cancelled
            | Self::InvalidQuestion { .. }
            | Self::Config(_) => false,
            Self::JsonParse(_) => true,
        }
    }
}

/// Errors from the search and fetch layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Security validation rejected the URL
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider rejected the request (4xx): credentials or quota
    #[error("provider rejected request: HTTP {status}")]
    Rejected { status: u16 },

    /// Provider-side failure (5xx)
    #[error("provider unavailable: HTTP {status}")]
    Unavailable { status: u16 },

    /// Rate limiter could not grant a permit within the wait budget
    #[error("rate limit wait exceeded")]
    RateLimitExceeded,

    /// Fetch timed out
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Malformed URL in a provider response
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl SearchError {
    /// 4xx responses are permanent; everything else is worth retrying.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. } | Self::Security(_) | Self::InvalidUrl { .. })
    }
}

/// Security-related errors for URL validation.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (localhost, metadata hosts, blocklisted domain)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in a blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for research operations.
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Result type alias for search/fetch operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
