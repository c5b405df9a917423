//! Document fetcher trait and implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{SearchError, SearchResult};

/// A fetched page body before text extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub title: Option<String>,
    pub html: String,
}

impl FetchedPage {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            title: None,
            html: html.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Raw page fetch capability.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> SearchResult<FetchedPage>;
}

/// Plain HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(8))
    }
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            user_agent: "GroundlineResearchBot/1.0".to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> SearchResult<FetchedPage> {
        debug!(url = %url, "fetch starting");
        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "fetch failed");
                if e.is_timeout() {
                    SearchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    SearchError::Http(Box::new(e))
                }
            })?;

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

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        Ok(FetchedPage::new(final_url, html))
    }
}

/// Mock fetcher for testing: serves predefined bodies by URL.
#[derive(Default)]
pub struct MockFetcher {
    pages: std::sync::RwLock<HashMap<String, FetchedPage>>,
    fail_urls: std::sync::RwLock<Vec<String>>,
    calls: std::sync::RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        let parsed = Url::parse(url).expect("mock page URL must parse");
        self.pages
            .write()
            .unwrap()
            .insert(url.to_string(), FetchedPage::new(parsed, html));
        self
    }

    /// Make a URL fail with a connection error.
    pub fn fail_url(self, url: &str) -> Self {
        self.fail_urls.write().unwrap().push(url.to_string());
        self
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> SearchResult<FetchedPage> {
        let key = url.to_string();
        self.calls.write().unwrap().push(key.clone());

        if self.fail_urls.read().unwrap().contains(&key) {
            return Err(SearchError::Http(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock connection refused",
            ))));
        }

        self.pages
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(SearchError::InvalidUrl { url: key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher() {
        let fetcher = MockFetcher::new()
            .with_page("https://example.com/a", "<html>A</html>")
            .fail_url("https://down.example.com/");

        let url = Url::parse("https://example.com/a").unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert!(page.html.contains("A"));

        let down = Url::parse("https://down.example.com/").unwrap();
        assert!(fetcher.fetch(&down).await.is_err());

        let missing = Url::parse("https://example.com/missing").unwrap();
        assert!(fetcher.fetch(&missing).await.is_err());
    }
}
