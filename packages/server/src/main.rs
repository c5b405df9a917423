//! Server entry point: wire capabilities, spawn workers, serve HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use research::security::{LlmCredentials, SearchCredentials};
use research::traits::clock::SystemClock;
use research::traits::fetch::HttpFetcher;
use research::traits::llm::ChatCompletionsClient;
use research::traits::search::{CustomSearchProvider, RateLimitedSearchProvider};
use research::{PlannerAgent, PostgresStore, ResearchContext, ValidatedFetcher};

use server_core::{build_router, AppState, Config, WorkerPool};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(
        PostgresStore::new(&config.database_url)
            .await
            .context("could not connect to database")?,
    );
    let db_pool = store.pool().clone();

    let mut search_credentials =
        SearchCredentials::new(&config.search_api_key, &config.search_engine_id);
    if let Some(endpoint) = &config.search_endpoint {
        search_credentials = search_credentials.with_endpoint(endpoint);
    }

    let ctx = ResearchContext {
        search: Arc::new(RateLimitedSearchProvider::new(CustomSearchProvider::new(
            search_credentials,
        ))),
        fetcher: Arc::new(ValidatedFetcher::new(HttpFetcher::default())),
        llm: Arc::new(ChatCompletionsClient::new(LlmCredentials::new(
            &config.llm_api_key,
            &config.llm_model,
        ))),
        clock: Arc::new(SystemClock),
        sessions: store.clone(),
        traces: store.clone(),
        answers: store.clone(),
        cache: store.clone(),
    };

    let planner = Arc::new(PlannerAgent::new(ctx, config.planner_config()));
    let (queue, _pool) = WorkerPool::spawn(planner, config.worker_count, config.queue_depth);

    let state = AppState {
        sessions: store.clone(),
        traces: store.clone(),
        answers: store,
        queue,
        trace_token: Arc::new(config.internal_trace_token.clone()),
        db_pool,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!(%addr, workers = config.worker_count, "server listening");

    axum::serve(listener, router)
        .await
        .context("server exited")?;
    Ok(())
}
