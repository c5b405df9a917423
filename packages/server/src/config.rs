use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use research::PlannerConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub search_api_key: String,
    pub search_engine_id: String,
    pub search_endpoint: Option<String>,
    pub llm_api_key: String,
    pub llm_model: String,
    pub internal_trace_token: String,
    pub max_attempts: u32,
    pub max_searches: u32,
    pub base_docs: u32,
    pub docs_step: u32,
    pub session_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub worker_count: usize,
    pub queue_depth: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            search_api_key: env::var("SEARCH_API_KEY").context("SEARCH_API_KEY must be set")?,
            search_engine_id: env::var("SEARCH_ENGINE_ID")
                .context("SEARCH_ENGINE_ID must be set")?,
            search_endpoint: env::var("SEARCH_ENDPOINT").ok(),
            llm_api_key: env::var("LLM_API_KEY").context("LLM_API_KEY must be set")?,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            internal_trace_token: env::var("INTERNAL_TRACE_TOKEN")
                .context("INTERNAL_TRACE_TOKEN must be set")?,
            max_attempts: parse_knob("MAX_ATTEMPTS", 3)?,
            max_searches: parse_knob("MAX_SEARCHES", 4)?,
            base_docs: parse_knob("BASE_DOCS", 5)?,
            docs_step: parse_knob("DOCS_STEP", 3)?,
            session_timeout_seconds: parse_knob("SESSION_TIMEOUT_SECONDS", 90)?,
            cache_ttl_seconds: parse_knob("CACHE_TTL_SECONDS", 3600)?,
            worker_count: parse_knob("WORKER_COUNT", 4)?,
            queue_depth: parse_knob("QUEUE_DEPTH", 256)?,
        })
    }

    /// Budget knobs as the planner expects them.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            max_attempts: self.max_attempts,
            max_searches: self.max_searches,
            base_docs: self.base_docs,
            docs_step: self.docs_step,
            session_timeout: Duration::from_secs(self.session_timeout_seconds),
            cache_ttl: Duration::from_secs(self.cache_ttl_seconds),
            ..PlannerConfig::default()
        }
    }
}

fn parse_knob<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}
