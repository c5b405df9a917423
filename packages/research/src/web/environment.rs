//! The web research environment: one search, bounded parallel
//! fetches, and text extraction, with the blocklist applied up front.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::traits::clock::Clock;
use crate::traits::fetch::DocumentFetcher;
use crate::traits::repository::TraceRepository;
use crate::traits::search::SearchProvider;
use crate::types::config::WebConfig;
use crate::types::document::Document;
use crate::types::session::SearchLog;
use crate::web::extract;
use crate::web::validate::UrlValidator;

/// Result of one environment invocation.
#[derive(Debug)]
pub struct GatherOutcome {
    /// Usable documents, search rank preserved, length <= `num_docs`.
    pub documents: Vec<Document>,
    /// False when the search provider itself failed.
    pub success: bool,
}

/// Search + fetch + extract for one attempt.
///
/// Every invocation appends a `SearchLog` row, success or not. Fetch
/// failures are skipped; only a provider failure makes the whole
/// gather unsuccessful.
pub struct WebEnvironment {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn DocumentFetcher>,
    traces: Arc<dyn TraceRepository>,
    clock: Arc<dyn Clock>,
    validator: UrlValidator,
    config: WebConfig,
}

impl WebEnvironment {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn DocumentFetcher>,
        traces: Arc<dyn TraceRepository>,
        clock: Arc<dyn Clock>,
        config: WebConfig,
    ) -> Self {
        Self {
            search,
            fetcher,
            traces,
            clock,
            validator: UrlValidator::new(),
            config,
        }
    }

    /// Run one search and fetch round for an attempt.
    ///
    /// A transient provider failure yields `success: false` with no
    /// documents; a permanent one (bad credentials) propagates so the
    /// planner can fail the session.
    pub async fn gather(
        &self,
        session_id: Uuid,
        attempt: u32,
        query: &str,
        num_docs: usize,
        cancel: &CancellationToken,
    ) -> Result<GatherOutcome> {
        // Over-request so blocklist filtering still leaves enough
        // candidates to fill the document budget.
        let candidates = match self.search.search(query, num_docs * 2).await {
            Ok(hits) => hits,
            Err(e) => {
                let permanent = !e.is_transient();
                warn!(session_id = %session_id, attempt, error = %e, "search provider failed");
                self.log_search(session_id, attempt, query, 0, false).await?;
                if permanent {
                    return Err(e.into());
                }
                return Ok(GatherOutcome {
                    documents: Vec::new(),
                    success: false,
                });
            }
        };

        let mut seen = HashSet::new();
        let urls: Vec<_> = candidates
            .into_iter()
            .filter(|hit| match self.validator.validate(&hit.url) {
                Ok(()) => seen.insert(hit.url.clone()),
                Err(reason) => {
                    debug!(url = %hit.url, %reason, "candidate filtered");
                    false
                }
            })
            .collect();

        let fetches = stream::iter(urls.into_iter().map(|hit| {
            let fetcher = Arc::clone(&self.fetcher);
            let timeout = self.config.fetch_timeout;
            async move {
                match tokio::time::timeout(timeout, fetcher.fetch(&hit.url)).await {
                    Ok(Ok(page)) => Some((hit, page)),
                    Ok(Err(e)) => {
                        warn!(url = %hit.url, error = %e, "fetch failed, skipping");
                        None
                    }
                    Err(_) => {
                        warn!(url = %hit.url, "fetch timed out, skipping");
                        None
                    }
                }
            }
        }))
        .buffered(self.config.fetch_concurrency)
        .collect::<Vec<_>>();

        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                info!(session_id = %session_id, attempt, "fetches cancelled");
                Vec::new()
            }
            result = tokio::time::timeout(self.config.fetch_budget, fetches) => {
                match result {
                    Ok(pages) => pages,
                    Err(_) => {
                        warn!(session_id = %session_id, attempt, "fetch budget exhausted");
                        Vec::new()
                    }
                }
            }
        };

        let now = self.clock.now();
        let documents: Vec<Document> = fetched
            .into_iter()
            .flatten()
            .filter_map(|(hit, page)| {
                let text = extract::extract_text(&page.html, self.config.max_document_chars);
                if text.len() < self.config.min_document_chars {
                    debug!(url = %page.url, chars = text.len(), "document too thin, dropped");
                    return None;
                }
                let title = page.title.or_else(|| extract::extract_title(&page.html));
                let mut doc = Document::new(&page.url, text, now);
                doc.title = title.or(hit.title);
                Some(doc)
            })
            .take(num_docs)
            .collect();

        info!(
            session_id = %session_id,
            attempt,
            query,
            num_docs = documents.len(),
            "gather complete"
        );
        self.log_search(session_id, attempt, query, documents.len() as u32, true)
            .await?;

        Ok(GatherOutcome {
            documents,
            success: true,
        })
    }

    async fn log_search(
        &self,
        session_id: Uuid,
        attempt: u32,
        query: &str,
        num_docs: u32,
        success: bool,
    ) -> Result<()> {
        self.traces
            .append_search_log(&SearchLog {
                session_id,
                attempt_number: attempt,
                query_used: query.to_string(),
                num_docs,
                success,
                created_at: self.clock.now(),
            })
            .await
    }
}
