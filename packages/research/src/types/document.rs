//! Fetched web documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A fetched page with its extracted main text.
///
/// `url` is unique within one attempt; `text` is bounded by
/// `WebConfig::max_document_chars` at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    pub fn new(url: &Url, text: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            domain: registered_domain(url.host_str().unwrap_or_default()),
            title: None,
            text: text.into(),
            fetched_at,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Common second-level labels under which the registrable name sits
/// one level deeper (`example.co.uk`, not `co.uk`).
const PUBLIC_SECOND_LEVELS: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu"];

/// Approximate the registered domain of a host.
///
/// Trims a `www.` prefix and keeps the last two labels, or three when
/// the second level is a common public suffix label. Good enough for
/// independence counting without a full public-suffix list.
pub fn registered_domain(host: &str) -> String {
    let host = host.trim_start_matches("www.").to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => String::new(),
        1 | 2 => labels.join("."),
        n => {
            let take = if PUBLIC_SECOND_LEVELS.contains(&labels[n - 2]) && labels[n - 1].len() == 2
            {
                3
            } else {
                2
            };
            labels[n - take..].join(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_domain() {
        assert_eq!(registered_domain("www.nasa.gov"), "nasa.gov");
        assert_eq!(registered_domain("en.wikipedia.org"), "wikipedia.org");
        assert_eq!(registered_domain("news.bbc.co.uk"), "bbc.co.uk");
        assert_eq!(registered_domain("britannica.com"), "britannica.com");
        assert_eq!(registered_domain("localhost"), "localhost");
    }

    #[test]
    fn test_document_domain_from_url() {
        let url = Url::parse("https://www.nasa.gov/voyager").unwrap();
        let doc = Document::new(&url, "text", Utc::now());
        assert_eq!(doc.domain, "nasa.gov");
    }
}
