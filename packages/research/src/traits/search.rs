//! Web search provider trait and implementations.
//!
//! The planner never talks to a search API directly; it goes through
//! `SearchProvider` so tests can script results and production can
//! swap providers without touching the pipeline.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{SearchError, SearchResult};
use crate::security::SearchCredentials;

/// A candidate URL from web search with metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub url: Url,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

impl SearchHit {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: None,
            snippet: None,
        }
    }

    /// Create from a URL string, dropping unparseable URLs.
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(Self::new)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Web search capability.
///
/// Returns candidate URLs for a query. The caller decides which to
/// fetch; a provider-side failure is an error, an empty result is not.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> SearchResult<Vec<SearchHit>>;
}

/// Mock search provider for testing.
#[derive(Default)]
pub struct MockSearchProvider {
    results: std::sync::RwLock<std::collections::HashMap<String, Vec<SearchHit>>>,
    fail_queries: std::sync::RwLock<Vec<String>>,
    calls: std::sync::RwLock<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add results for a query.
    pub fn with_results(self, query: &str, results: Vec<SearchHit>) -> Self {
        self.results
            .write()
            .unwrap()
            .insert(query.to_string(), results);
        self
    }

    /// Add URL strings as results.
    pub fn with_urls(self, query: &str, urls: &[&str]) -> Self {
        let results: Vec<_> = urls.iter().filter_map(|u| SearchHit::from_url(u)).collect();
        self.with_results(query, results)
    }

    /// Make a query fail with a transient provider error.
    pub fn fail_query(self, query: &str) -> Self {
        self.fail_queries.write().unwrap().push(query.to_string());
        self
    }

    /// Queries issued so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str, limit: usize) -> SearchResult<Vec<SearchHit>> {
        self.calls.write().unwrap().push(query.to_string());

        if self.fail_queries.read().unwrap().iter().any(|q| q == query) {
            return Err(SearchError::Unavailable { status: 503 });
        }

        let mut results = self
            .results
            .read()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }
}

/// Hosted web-search provider speaking a JSON POST API.
///
/// Credentials come from `SEARCH_API_KEY` / `SEARCH_ENGINE_ID`; the
/// endpoint can be overridden for proxies and compatible providers.
pub struct CustomSearchProvider {
    credentials: SearchCredentials,
    client: reqwest::Client,
}

impl CustomSearchProvider {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.websearch.dev/v1/search";

    pub fn new(credentials: SearchCredentials) -> Self {
        Self {
            credentials,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> &str {
        self.credentials
            .endpoint
            .as_deref()
            .unwrap_or(Self::DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl SearchProvider for CustomSearchProvider {
    async fn search(&self, query: &str, limit: usize) -> SearchResult<Vec<SearchHit>> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            query: &'a str,
            engine_id: &'a str,
            max_results: usize,
        }

        #[derive(serde::Deserialize)]
        struct Response {
            results: Vec<ProviderHit>,
        }

        #[derive(serde::Deserialize)]
        struct ProviderHit {
            url: String,
            title: Option<String>,
            snippet: Option<String>,
        }

        let response = self
            .client
            .post(self.endpoint())
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key.expose()),
            )
            .json(&Request {
                query,
                engine_id: &self.credentials.engine_id,
                max_results: limit,
            })
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(SearchError::Rejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(SearchError::Unavailable {
                status: status.as_u16(),
            });
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        let hits = body
            .results
            .into_iter()
            .filter_map(|r| {
                let mut hit = SearchHit::from_url(&r.url)?;
                if let Some(title) = r.title {
                    hit = hit.with_title(title);
                }
                if let Some(snippet) = r.snippet {
                    hit = hit.with_snippet(snippet);
                }
                Some(hit)
            })
            .collect();

        Ok(hits)
    }
}

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Process-wide rate limit for the shared search provider.
///
/// Excess callers queue up to `max_wait`, then fail their attempt
/// with `RateLimitExceeded`.
pub struct RateLimitedSearchProvider<P: SearchProvider> {
    inner: P,
    limiter: Arc<DirectRateLimiter>,
    max_wait: Duration,
}

impl<P: SearchProvider> RateLimitedSearchProvider<P> {
    pub fn new(inner: P) -> Self {
        // Process-wide default: 10 search calls per second.
        Self::with_rate(inner, nonzero!(10u32))
    }

    pub fn with_rate(inner: P, calls_per_second: NonZeroU32) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(calls_per_second))),
            max_wait: Duration::from_secs(2),
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

#[async_trait]
impl<P: SearchProvider> SearchProvider for RateLimitedSearchProvider<P> {
    async fn search(&self, query: &str, limit: usize) -> SearchResult<Vec<SearchHit>> {
        tokio::time::timeout(self.max_wait, self.limiter.until_ready())
            .await
            .map_err(|_| SearchError::RateLimitExceeded)?;
        self.inner.search(query, limit).await
    }
}
