//! LLM completion capability.
//!
//! One primitive: a deterministic chat completion. The pipeline builds
//! prompts; implementations handle transport. Sampling settings are
//! pinned so claim extraction stays idempotent across retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ResearchError, Result};
use crate::security::LlmCredentials;

/// A single completion request with deterministic settings.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// LLM completion capability.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Run one completion and return the raw text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Chat-completions client for OpenAI-compatible APIs.
///
/// Temperature is pinned to 0 and a per-call timeout is enforced;
/// a timeout surfaces as a retriable error.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    credentials: LlmCredentials,
    call_timeout: Duration,
}

impl ChatCompletionsClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(credentials: LlmCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.credentials.model
    }

    fn base_url(&self) -> &str {
        self.credentials
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn post_completion(&self, request: &CompletionRequest) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }

        let body = ChatRequest {
            model: &self.credentials.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: 0.0,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key.expose()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::Llm(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::Llm(
                format!("completion API returned HTTP {}", status).into(),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::Llm(Box::new(e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ResearchError::Llm("completion API returned no choices".into()))
    }
}

#[async_trait]
impl LLMClient for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        tokio::time::timeout(self.call_timeout, self.post_completion(request))
            .await
            .map_err(|_| ResearchError::LlmTimeout {
                seconds: self.call_timeout.as_secs(),
            })?
    }
}
