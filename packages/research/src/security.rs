//! Credential handling for the injected capabilities.
//!
//! API keys ride inside `secrecy::SecretBox` so a stray `{:?}` in a
//! log line can never leak them; the capability constructors take the
//! typed bundles below instead of loose strings.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// An API key or token that is never printed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the value for an outgoing request. Call at the last
    /// moment, where the header is built.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Credentials for the LLM completion capability.
#[derive(Clone)]
pub struct LlmCredentials {
    pub api_key: SecretString,

    /// Model identifier (e.g. `gpt-4o`).
    pub model: String,

    /// API base URL override (proxies, compatible providers).
    pub base_url: Option<String>,
}

impl LlmCredentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

impl fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCredentials")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Credentials for the hosted web-search capability.
#[derive(Clone)]
pub struct SearchCredentials {
    pub api_key: SecretString,

    /// Provider-side engine/configuration identifier.
    pub engine_id: String,

    /// Endpoint override; the provider default applies when absent.
    pub endpoint: Option<String>,
}

impl SearchCredentials {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            engine_id: engine_id.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl fmt::Debug for SearchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCredentials")
            .field("api_key", &self.api_key)
            .field("engine_id", &self.engine_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
